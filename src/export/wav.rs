//! WAV file export

use crate::module::Module;
use crate::replayer::{PlayerConfig, SonicPlayer};
use crate::{Result, SonicError};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Milliseconds pulled from the player per chunk
const CHUNK_MILLIS: u32 = 1_000;

/// What an export wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    /// Frames written (one per channel group)
    pub frames: u64,
    /// Output rate
    pub sample_rate: u32,
    /// 1 or 2
    pub channels: u16,
    /// Whether the song reached its end (false when the duration cap hit first)
    pub completed: bool,
}

impl ExportSummary {
    /// Written duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Render a song to a 16-bit PCM WAV file
///
/// Playback stops at the end of the song or after `max_seconds`, whichever
/// comes first; the cap keeps looping songs finite.
///
/// # Examples
///
/// ```no_run
/// use sonic_arranger::{export_to_wav, load_file, PlayerConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let module = load_file("song.sa")?;
/// let summary = export_to_wav(module, PlayerConfig::stereo(44_100), "song.wav", 300)?;
/// println!("{:.1}s written", summary.duration_secs());
/// # Ok(())
/// # }
/// ```
pub fn export_to_wav<P: AsRef<Path>>(
    module: Arc<Module>,
    config: PlayerConfig,
    output_path: P,
    max_seconds: u32,
) -> Result<ExportSummary> {
    let channels = config.channels() as u16;
    let sample_rate = config.sample_rate;
    let mut player = SonicPlayer::new(module, config)?;

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output_path.as_ref(), spec)
        .map_err(|e| SonicError::Export(format!("failed to create WAV file: {e}")))?;

    tracing::info!(
        path = %output_path.as_ref().display(),
        rate = sample_rate,
        channels,
        "rendering to WAV"
    );

    let mut samples: u64 = 0;
    let mut remaining_ms = max_seconds as u64 * 1000;
    while remaining_ms > 0 && !player.is_end_of_stream() {
        let ms = remaining_ms.min(CHUNK_MILLIS as u64) as u32;
        let chunk = player.read(ms)?;
        for &sample in &chunk {
            writer
                .write_sample((sample as i16) << 8)
                .map_err(|e| SonicError::Export(format!("failed to write sample: {e}")))?;
        }
        samples += chunk.len() as u64;
        remaining_ms -= ms as u64;
    }

    writer
        .finalize()
        .map_err(|e| SonicError::Export(format!("failed to finalize WAV file: {e}")))?;

    let summary = ExportSummary {
        frames: samples / channels as u64,
        sample_rate,
        channels,
        completed: player.is_end_of_stream(),
    };
    tracing::info!(
        seconds = summary.duration_secs(),
        completed = summary.completed,
        "export complete"
    );
    Ok(summary)
}
