/// Sample rate every buffer is normalized to before it reaches the engine.
pub const SAMPLE_RATE: u32 = 44_100;
/// Interleaved channel count every buffer is normalized to.
pub const CHANNELS: u16 = 2;
/// Bytes per interleaved frame (two i16 samples).
pub const BYTES_PER_FRAME: usize = CHANNELS as usize * std::mem::size_of::<i16>();

/// Decoded, normalized PCM: interleaved stereo i16 at 44.1 kHz.
///
/// Built once per track and shared read-only between the playback engine and the
/// analysis worker. Loading another track replaces the whole value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedAudio {
    samples: Vec<i16>,
}

impl NormalizedAudio {
    /// Wrap interleaved stereo samples. A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<i16>) -> Self {
        let remainder = samples.len() % CHANNELS as usize;
        if remainder != 0 {
            log::warn!(
                "PCM buffer has {} trailing sample(s) outside a whole frame, dropping them",
                remainder
            );
            samples.truncate(samples.len() - remainder);
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Native-endian byte view of the samples, as handed to the output device.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples)
    }

    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    pub fn channels(&self) -> u16 {
        CHANNELS
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / CHANNELS as usize
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / SAMPLE_RATE as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Collapse to a float mono signal for analysis.
    pub fn to_mono(&self) -> Vec<f32> {
        reduce_to_mono(&self.samples, CHANNELS as usize)
    }
}

/// Average each interleaved frame down to one sample in [-1, 1].
pub fn reduce_to_mono(samples: &[i16], channels: usize) -> Vec<f32> {
    if channels == 0 {
        return Vec::new();
    }
    let scale = 1.0 / (channels as f32 * 32768.0);
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| s as f32).sum::<f32>() * scale)
        .collect()
}
