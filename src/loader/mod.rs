//! Module Loader
//!
//! Loads modules from memory, seekable readers or disk, auto-detecting the
//! container dialect.

use crate::module::{Dialect, Module};
use crate::parser::{ChunkedParser, FormatParser, LegacyParser};
use crate::{Result, SonicError};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

/// Detect the container dialect from the data itself
pub fn detect_dialect(data: &[u8]) -> Option<Dialect> {
    if ChunkedParser::matches(data) {
        Some(Dialect::Chunked)
    } else if LegacyParser::locate(data).is_some() {
        Some(Dialect::Legacy)
    } else {
        None
    }
}

/// Parse a module held in memory
pub fn load_bytes(data: &[u8]) -> Result<Arc<Module>> {
    let parser: &dyn FormatParser = match detect_dialect(data) {
        Some(Dialect::Chunked) => &ChunkedParser,
        Some(Dialect::Legacy) => &LegacyParser,
        None => {
            return Err(SonicError::format(
                "unsupported file format. Supported: SOAR chunked, legacy pointer table",
            ))
        }
    };
    tracing::debug!(parser = parser.name(), bytes = data.len(), "loading module");
    parser.parse(data).map(Arc::new)
}

/// Parse a module from a seekable byte source, starting at its beginning
pub fn load_reader<R: Read + Seek>(reader: &mut R) -> Result<Arc<Module>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    load_bytes(&data)
}

/// Load a module file from disk
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Arc<Module>> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    tracing::info!(path = %path.display(), "loaded module file");
    load_bytes(&data)
}
