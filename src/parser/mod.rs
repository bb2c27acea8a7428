//! Module Format Parsing
//!
//! Parser implementations for the two Sonic Arranger containers:
//! - Chunked `SOAR` files written by the editor
//! - Legacy pointer-table modules saved together with their replay routine
//!
//! Both decode the same fixed-width records (see [`records`]).

pub mod chunked;
pub mod legacy;
pub mod records;

pub use chunked::ChunkedParser;
pub use legacy::LegacyParser;

use crate::module::Module;
use crate::Result;

/// Trait for parsing a module container into its tables
pub trait FormatParser {
    /// Parse file data and return the decoded module
    fn parse(&self, data: &[u8]) -> Result<Module>;

    /// Get parser name
    fn name(&self) -> &str;
}
