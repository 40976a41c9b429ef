//! DWARF debug info parsing for offline name resolution
//!
//! Maps function addresses recorded in a trace back to function names and
//! source locations of the instrumented binary. Uses the addr2line crate for
//! DWARF parsing.
//!
//! Addresses captured from a position-independent executable are runtime
//! addresses; set a load bias (runtime base minus link-time base) so they line
//! up with the binary's debug info.

use crate::event::FunctionAddr;
use crate::symbols::NameResolver;
use anyhow::{Context, Result};
use object::{Object, ObjectSection};
use std::fmt;
use std::fs::File;
use std::path::Path;

/// Source location information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file path
    pub file: String,
    /// Line number
    pub line: u32,
    /// Column number (if available)
    pub column: Option<u32>,
    /// Function name (if available)
    pub function: Option<String>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// DWARF debug info context for a binary
pub struct DwarfContext {
    /// addr2line context for DWARF lookups
    context: addr2line::Context<gimli::EndianRcSlice<gimli::RunTimeEndian>>,
    /// Subtracted from every address before lookup
    load_bias: u64,
}

impl DwarfContext {
    /// Load DWARF debug info from an ELF binary
    pub fn load(binary_path: &Path) -> Result<Self> {
        if !binary_path.exists() {
            anyhow::bail!("Binary does not exist: {}", binary_path.display());
        }

        let file = File::open(binary_path)
            .with_context(|| format!("Failed to open binary: {}", binary_path.display()))?;

        let mmap = unsafe { memmap2::Mmap::map(&file) }.context("Failed to memory-map binary")?;

        let object = object::File::parse(&*mmap).context("Failed to parse ELF binary")?;

        let endian = if object.is_little_endian() {
            gimli::RunTimeEndian::Little
        } else {
            gimli::RunTimeEndian::Big
        };

        // Missing sections load as empty so stripped binaries fail at lookup, not here
        let load_section =
            |id: gimli::SectionId| -> Result<gimli::EndianRcSlice<gimli::RunTimeEndian>> {
                let data = object
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[]));
                let bytes: std::rc::Rc<[u8]> = std::rc::Rc::from(data.into_owned());
                Ok(gimli::EndianRcSlice::new(bytes, endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)
            .context("Failed to load DWARF sections - binary may lack debug info (build with -g)")?;

        let context =
            addr2line::Context::from_dwarf(dwarf).context("Failed to create DWARF context")?;

        tracing::debug!(binary = %binary_path.display(), "DWARF context loaded");
        Ok(Self {
            context,
            load_bias: 0,
        })
    }

    pub fn with_load_bias(mut self, bias: u64) -> Self {
        self.load_bias = bias;
        self
    }

    fn probe(&self, addr: FunctionAddr) -> u64 {
        addr.0.wrapping_sub(self.load_bias)
    }

    /// Name of the outermost (non-inlined) function covering `addr`
    pub fn function_name(&self, addr: FunctionAddr) -> Result<Option<String>> {
        let mut frames = self
            .context
            .find_frames(self.probe(addr))
            .skip_all_loads()
            .context("DWARF frame lookup failed")?;

        let mut outermost = None;
        while let Some(frame) = frames.next().context("DWARF frame iteration failed")? {
            if let Some(func) = frame.function {
                let name = match func.demangle() {
                    Ok(name) => name.into_owned(),
                    Err(_) => func.raw_name()?.into_owned(),
                };
                outermost = Some(name);
            }
        }
        Ok(outermost)
    }

    /// Source location of `addr`, if the line table covers it
    pub fn lookup(&self, addr: FunctionAddr) -> Result<Option<SourceLocation>> {
        let location = match self.context.find_location(self.probe(addr)) {
            Ok(Some(loc)) => loc,
            Ok(None) => return Ok(None),
            Err(e) => return Err(e).context("DWARF line lookup failed"),
        };

        let Some(file) = location.file else {
            return Ok(None);
        };
        let line = location.line.unwrap_or(0);
        if line == 0 {
            return Ok(None);
        }

        Ok(Some(SourceLocation {
            file: file.to_string(),
            line,
            column: location.column,
            function: self.function_name(addr)?,
        }))
    }
}

impl NameResolver for DwarfContext {
    fn resolve(&self, addr: FunctionAddr) -> Option<String> {
        match self.function_name(addr) {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(%addr, error = %e, "DWARF name lookup failed");
                None
            }
        }
    }

    fn source_location(&self, addr: FunctionAddr) -> Option<String> {
        match self.lookup(addr) {
            Ok(location) => location.map(|loc| loc.to_string()),
            Err(e) => {
                tracing::debug!(%addr, error = %e, "DWARF line lookup failed");
                None
            }
        }
    }
}
