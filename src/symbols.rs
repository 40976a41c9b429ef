//! Address to name resolution for reports
//!
//! Resolution only ever happens while rendering, never during capture.

use crate::event::FunctionAddr;
use fnv::FnvHashMap;

/// Looks up a human-readable name for a function address
pub trait NameResolver {
    fn resolve(&self, addr: FunctionAddr) -> Option<String>;

    /// `file:line` covering the address, when the resolver has line info
    fn source_location(&self, _addr: FunctionAddr) -> Option<String> {
        None
    }
}

/// Resolver that knows no names
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl NameResolver for NoSymbols {
    fn resolve(&self, _addr: FunctionAddr) -> Option<String> {
        None
    }
}

/// Explicit address to name map
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: FnvHashMap<FunctionAddr, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, addr: FunctionAddr, name: impl Into<String>) {
        self.names.insert(addr, name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(FunctionAddr, String)> for SymbolTable {
    fn from_iter<T: IntoIterator<Item = (FunctionAddr, String)>>(iter: T) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl NameResolver for SymbolTable {
    fn resolve(&self, addr: FunctionAddr) -> Option<String> {
        self.names.get(&addr).cloned()
    }
}

/// Resolves addresses inside the running process (dladdr-style lookup)
///
/// Only meaningful for traces captured by this same process, e.g. through
/// the global recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessResolver;

impl NameResolver for ProcessResolver {
    fn resolve(&self, addr: FunctionAddr) -> Option<String> {
        let mut name = None;
        backtrace::resolve(addr.0 as usize as *mut std::ffi::c_void, |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| n.to_string());
            }
        });
        name
    }

    fn source_location(&self, addr: FunctionAddr) -> Option<String> {
        let mut location = None;
        backtrace::resolve(addr.0 as usize as *mut std::ffi::c_void, |symbol| {
            if location.is_none() {
                if let (Some(file), Some(line)) = (symbol.filename(), symbol.lineno()) {
                    location = Some(format!("{}:{line}", file.display()));
                }
            }
        });
        location
    }
}

/// Tries each resolver in turn, returning the first hit
#[derive(Default)]
pub struct ChainResolver<'a> {
    resolvers: Vec<&'a dyn NameResolver>,
}

impl<'a> ChainResolver<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: &'a dyn NameResolver) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl NameResolver for ChainResolver<'_> {
    fn resolve(&self, addr: FunctionAddr) -> Option<String> {
        self.resolvers.iter().find_map(|r| r.resolve(addr))
    }

    fn source_location(&self, addr: FunctionAddr) -> Option<String> {
        self.resolvers.iter().find_map(|r| r.source_location(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn resolvable_marker() -> u32 {
        std::hint::black_box(7)
    }

    #[test]
    fn test_no_symbols() {
        assert_eq!(NoSymbols.resolve(FunctionAddr(0x1234)), None);
    }

    #[test]
    fn test_symbol_table_lookup() {
        let mut table = SymbolTable::new();
        table.insert(FunctionAddr(0x10), "main");
        assert_eq!(table.resolve(FunctionAddr(0x10)).as_deref(), Some("main"));
        assert_eq!(table.resolve(FunctionAddr(0x11)), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_chain_prefers_first_hit() {
        let mut first = SymbolTable::new();
        first.insert(FunctionAddr(1), "from_first");
        let mut second = SymbolTable::new();
        second.insert(FunctionAddr(1), "from_second");
        second.insert(FunctionAddr(2), "only_second");

        let chain = ChainResolver::new().with(&first).with(&second);
        assert_eq!(chain.resolve(FunctionAddr(1)).as_deref(), Some("from_first"));
        assert_eq!(chain.resolve(FunctionAddr(2)).as_deref(), Some("only_second"));
        assert_eq!(chain.resolve(FunctionAddr(3)), None);
        assert_eq!(chain.source_location(FunctionAddr(1)), None);
    }

    #[test]
    fn test_process_resolver_does_not_panic() {
        assert_eq!(resolvable_marker(), 7);
        let addr = FunctionAddr(resolvable_marker as usize as u64);
        // Symbol availability depends on how the test binary was built
        let _ = ProcessResolver.resolve(addr);
        let _ = ProcessResolver.resolve(FunctionAddr(0));
        let _ = ProcessResolver.source_location(addr);
    }
}
