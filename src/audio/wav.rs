use anyhow::{Context, Result};
use std::path::Path;

use super::pcm::NormalizedAudio;

/// Write the normalized buffer as a 16-bit PCM WAV file.
pub fn export_wav(audio: &NormalizedAudio, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in audio.samples() {
        writer.write_sample(sample).context("Failed to write WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;

    log::info!(
        "Exported {} frames ({:.1}s) to {}",
        audio.frame_count(),
        audio.duration(),
        path.display()
    );
    Ok(())
}
