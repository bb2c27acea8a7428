//! Sonic Arranger Module Replayer
//!
//! Decodes Sonic Arranger tracker modules (both the chunked `SOAR` container
//! and the legacy pointer-table layout) and resynthesizes them through an
//! emulation of the Amiga Paula four-channel DMA sound hardware.
//!
//! # Features
//! - Two-dialect big-endian module parser producing immutable tables
//! - Paula channel emulation with snapshot-on-start and loop re-snapshot
//! - Per-channel note/effect compiler: vibrato, AMF, ADSR, fine tune drift
//!   and the 16 synth waveform effects
//! - Dual timing domains (interrupt clock + pattern step clock) on integer time
//! - Pull-based PCM API returning signed 8-bit chunks at any sample rate
//! - Optional WAV export (`export-wav` feature, enabled by default)
//!
//! # Quick start
//! ```no_run
//! use sonic_arranger::{load_file, PlayerConfig, SonicPlayer};
//!
//! let module = load_file("song.sa").unwrap();
//! let mut player = SonicPlayer::new(module, PlayerConfig::mono(22_050)).unwrap();
//! while !player.is_end_of_stream() {
//!     let chunk = player.read(100).unwrap();
//!     // hand `chunk` to the audio device
//! #   let _ = chunk;
//! }
//! ```

#![warn(missing_docs)]

pub mod constants;
#[cfg(feature = "export-wav")]
pub mod export; // WAV rendering
pub mod loader; // Dialect detection + file I/O
pub mod module; // Parsed data model
pub mod parser; // Binary table decoding
pub mod paula; // Channel emulation
pub mod replayer; // Playback engine
pub mod streaming; // Sample ring

/// Error types for module decoding and playback
#[derive(thiserror::Error, Debug)]
pub enum SonicError {
    /// Malformed module data (bad magic, sentinel, section size or offset)
    #[error("Format error: {0}")]
    Format(String),

    /// Argument outside its supported range
    #[error("Range error: {0}")]
    Range(String),

    /// `read` was called after the song ended
    #[error("End of stream reached")]
    EndOfStream,

    /// The module uses a command or effect this replayer does not implement
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// IO error from the byte source or filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing an exported audio file
    #[error("Export error: {0}")]
    Export(String),
}

impl SonicError {
    /// Shorthand for a [`SonicError::Format`] error
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        SonicError::Format(msg.into())
    }

    /// Shorthand for a [`SonicError::Range`] error
    pub(crate) fn range(msg: impl Into<String>) -> Self {
        SonicError::Range(msg.into())
    }
}

/// Result type for module decoding and playback
pub type Result<T> = std::result::Result<T, SonicError>;

pub use loader::{detect_dialect, load_bytes, load_file, load_reader};
pub use module::{Dialect, Instrument, Module, ModuleInfo, Note, Sample, Song, Voice, WaveTable};
pub use paula::{ChannelStatus, Paula};
pub use replayer::{PlaybackPosition, PlayerConfig, SonicPlayer, VideoStandard};

#[cfg(feature = "export-wav")]
pub use export::{export_to_wav, ExportSummary};
