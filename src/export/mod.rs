//! Audio export
//!
//! Renders a whole song through [`crate::SonicPlayer`] into a file.

pub mod wav;

pub use wav::{export_to_wav, ExportSummary};
