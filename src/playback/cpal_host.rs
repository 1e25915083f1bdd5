//! CPAL output host
//!
//! Opens the default (or a named) output device at the buffer's channel count
//! and sample rate. i16 devices are fed straight from the PCM bytes; f32
//! devices go through a scratch block allocated when the stream is built, so
//! the callback itself never allocates.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, Stream, StreamConfig};

use super::device::{OutputHost, OutputStream};
use super::error::{AudioError, AudioResult};
use super::renderer::PcmRenderer;

/// Interleaved samples converted per pass on the f32 path.
const F32_SCRATCH_SAMPLES: usize = 8192;

/// An output device as reported by the host.
#[derive(Debug, Clone)]
pub struct OutputDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List output devices on the default host.
pub fn list_output_devices() -> AudioResult<Vec<OutputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Enumerate(e.to_string()))?;

    Ok(devices
        .filter_map(|d| d.name().ok())
        .map(|name| OutputDeviceInfo {
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        })
        .collect())
}

/// Opens streams through CPAL.
#[derive(Debug, Clone, Default)]
pub struct CpalHost {
    /// Device name to use; `None` picks the host default.
    device_name: Option<String>,
    /// Fixed device buffer size in frames; `None` lets the driver choose.
    buffer_frames: Option<u32>,
}

impl CpalHost {
    pub fn new(device_name: Option<String>, buffer_frames: Option<u32>) -> Self {
        Self {
            device_name,
            buffer_frames,
        }
    }

    fn find_device(&self) -> AudioResult<cpal::Device> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host.default_output_device().ok_or(AudioError::NoDefaultDevice),
            Some(wanted) => host
                .output_devices()
                .map_err(|e| AudioError::Enumerate(e.to_string()))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.clone())),
        }
    }
}

/// Pick the sample format to open with: i16 if offered, else f32.
fn pick_sample_format(
    device: &cpal::Device,
    channels: u16,
    sample_rate: u32,
) -> AudioResult<SampleFormat> {
    let unsupported = |reason: String| AudioError::UnsupportedConfig {
        channels,
        sample_rate,
        reason,
    };

    let formats: Vec<SampleFormat> = device
        .supported_output_configs()
        .map_err(|e| unsupported(e.to_string()))?
        .filter(|c| {
            c.channels() == channels
                && c.min_sample_rate().0 <= sample_rate
                && c.max_sample_rate().0 >= sample_rate
        })
        .map(|c| c.sample_format())
        .collect();

    [SampleFormat::I16, SampleFormat::F32]
        .into_iter()
        .find(|f| formats.contains(f))
        .ok_or_else(|| unsupported(format!("no i16/f32 config among {:?}", formats)))
}

struct CpalStream(Stream);

impl OutputStream for CpalStream {
    fn play(&self) -> AudioResult<()> {
        self.0
            .play()
            .map_err(|e| AudioError::StreamPlayError(e.to_string()))
    }

    fn pause(&self) -> AudioResult<()> {
        self.0
            .pause()
            .map_err(|e| AudioError::StreamPauseError(e.to_string()))
    }
}

impl OutputHost for CpalHost {
    fn open(&mut self, renderer: PcmRenderer) -> AudioResult<Box<dyn OutputStream>> {
        let device = self.find_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let channels = renderer.channels();
        let sample_rate = renderer.sample_rate();
        let sample_format = pick_sample_format(&device, channels, sample_rate)?;

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: match self.buffer_frames {
                Some(frames) => BufferSize::Fixed(frames),
                None => BufferSize::Default,
            },
        };

        log::info!(
            "Opening audio device '{}': {} channels, {}Hz, {:?}, buffer {:?}",
            device_name,
            channels,
            sample_rate,
            sample_format,
            config.buffer_size
        );

        let on_error = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| {
                    renderer.render_i16(data);
                },
                on_error,
                None,
            ),
            _ => {
                let mut scratch = vec![0i16; F32_SCRATCH_SAMPLES];
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                        for chunk in data.chunks_mut(scratch.len()) {
                            let block = &mut scratch[..chunk.len()];
                            renderer.render_i16(block);
                            for (out, &s) in chunk.iter_mut().zip(block.iter()) {
                                *out = s as f32 / 32768.0;
                            }
                        }
                    },
                    on_error,
                    None,
                )
            }
        }
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

        // Some backends start streams on build; stay silent until play().
        if let Err(err) = stream.pause() {
            log::debug!("Could not pause freshly built stream: {}", err);
        }

        Ok(Box::new(CpalStream(stream)))
    }
}
