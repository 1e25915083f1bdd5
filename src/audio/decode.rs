use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::pcm::{NormalizedAudio, CHANNELS, SAMPLE_RATE};

/// Input frames per resampler call
const RESAMPLE_CHUNK: usize = 1024;

/// Decode an audio file and normalize it to 44.1 kHz interleaved stereo i16.
pub fn decode_file(path: &Path) -> Result<NormalizedAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut stereo: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::debug!("Skipping undecodable packet: {}", err);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        to_stereo(sample_buf.samples(), channels, &mut stereo);
    }

    let stereo = if sample_rate != SAMPLE_RATE {
        log::info!("Resampling {}Hz -> {}Hz", sample_rate, SAMPLE_RATE);
        resample(&stereo, sample_rate, SAMPLE_RATE)?
    } else {
        stereo
    };

    let audio = NormalizedAudio::new(quantize(&stereo));

    log::info!(
        "Decoded audio: {} frames, {}Hz source, {} source channel(s), {:.1}s",
        audio.frame_count(),
        sample_rate,
        channels,
        audio.duration()
    );

    Ok(audio)
}

/// Map interleaved frames of any channel count onto stereo.
/// Mono is duplicated; anything past the first two channels is dropped.
fn to_stereo(samples: &[f32], channels: usize, out: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            for &s in samples {
                out.push(s);
                out.push(s);
            }
        }
        2 => out.extend_from_slice(samples),
        n => {
            for frame in samples.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
        }
    }
}

/// Band-limited sample rate conversion of interleaved stereo with rubato.
///
/// Channels are de-interleaved and fed through `SincFixedIn` in fixed chunks;
/// the filter delay is trimmed so the output lines up with the input and holds
/// `frames * to_rate / from_rate` frames.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};

    let channels = CHANNELS as usize;
    let frames = samples.len() / channels;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, RESAMPLE_CHUNK, channels)
        .context("Failed to create resampler")?;

    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
        .collect();

    let expected = (frames as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    let mut pos = 0;
    while pos + resampler.input_frames_next() <= frames {
        let end = pos + resampler.input_frames_next();
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..end]).collect();
        let produced = resampler.process(chunk.as_slice(), None).context("Resampling failed")?;
        append_planar(&mut out, produced);
        pos = end;
    }
    if pos < frames {
        let chunk: Vec<&[f32]> = planar.iter().map(|c| &c[pos..]).collect();
        let produced = resampler
            .process_partial(Some(chunk.as_slice()), None)
            .context("Resampling failed")?;
        append_planar(&mut out, produced);
    }
    // Flush the filter tail.
    while out[0].len() < delay + expected {
        let produced = resampler
            .process_partial::<&[f32]>(None, None)
            .context("Resampling failed")?;
        if produced[0].is_empty() {
            break;
        }
        append_planar(&mut out, produced);
    }

    let available = out[0].len().saturating_sub(delay).min(expected);
    let mut interleaved = Vec::with_capacity(available * channels);
    for i in delay..delay + available {
        for channel in &out {
            interleaved.push(channel[i]);
        }
    }
    Ok(interleaved)
}

fn append_planar(out: &mut [Vec<f32>], produced: Vec<Vec<f32>>) {
    for (channel, block) in out.iter_mut().zip(produced) {
        channel.extend_from_slice(&block);
    }
}

fn quantize(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            let s = if s.is_finite() { s } else { 0.0 };
            (s.clamp(-1.0, 1.0) * 32767.0).round() as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono_is_duplicated_and_surround_is_cut() {
        let mut out = Vec::new();
        to_stereo(&[0.1, 0.2], 1, &mut out);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);

        out.clear();
        to_stereo(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.4, 0.5]);
    }

    fn sine(freq: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin();
                [v, v]
            })
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn resampling_scales_frame_count() {
        let out = resample(&vec![0.0f32; 48_000 * 2], 48_000, 44_100).unwrap();
        assert_eq!(out.len(), 44_100 * 2);

        let out = resample(&vec![0.0f32; 1_000 * 2], 22_050, 44_100).unwrap();
        assert_eq!(out.len(), 2_000 * 2);

        assert!(resample(&[], 48_000, 44_100).unwrap().is_empty());
    }

    #[test]
    fn content_above_the_new_nyquist_is_filtered_out() {
        // 30 kHz is representable at 96 kHz but not at 44.1 kHz.
        let input = sine(30_000.0, 96_000, 96_000);
        let out = resample(&input, 96_000, 44_100).unwrap();
        let body = &out[4_000..out.len() - 4_000];
        assert!(rms(body) < 0.01, "aliased energy: rms {}", rms(body));
    }

    #[test]
    fn audible_tones_pass_through() {
        let input = sine(1_000.0, 48_000, 48_000);
        let out = resample(&input, 48_000, 44_100).unwrap();
        let body = &out[4_000..out.len() - 4_000];
        // 0.5 amplitude sine
        assert!((rms(body) - 0.5 / 2f32.sqrt()).abs() < 0.01, "rms {}", rms(body));
        // Left and right stay identical.
        assert!(out.chunks_exact(2).all(|f| (f[0] - f[1]).abs() < 1e-6));
    }

    #[test]
    fn quantize_clamps_and_scrubs_non_finite() {
        assert_eq!(quantize(&[2.0, -2.0, f32::NAN, 0.5]), vec![32767, -32767, 0, 16384]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_file(Path::new("/nonexistent/track.flac")).is_err());
    }
}
