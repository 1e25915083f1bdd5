//! Transport control over one loaded PCM buffer.
//!
//! ```text
//!  Stopped --play()--> Playing --pause()--> Paused --play()--> Playing
//!  {Playing, Paused} --stop()--> Stopped   (position := 0)
//!  Playing --buffer exhausted--> Stopped   (position := end)
//!  load() forces Stopped from any state
//! ```
//!
//! A track that ran to its end sits at Stopped with the position on the last
//! byte, so `progress()` reads 1.0. The next `play()` notices and restarts from 0.

use std::sync::Arc;

use super::device::{OutputHost, OutputStream};
use super::error::AudioResult;
use super::renderer::PcmRenderer;
use super::transport::{PlaybackState, Transport};
use crate::audio::pcm::BYTES_PER_FRAME;
use crate::audio::NormalizedAudio;

pub struct PlaybackEngine {
    host: Box<dyn OutputHost>,
    audio: Arc<NormalizedAudio>,
    transport: Arc<Transport>,
    stream: Option<Box<dyn OutputStream>>,
}

impl PlaybackEngine {
    pub fn new(host: Box<dyn OutputHost>) -> Self {
        Self {
            host,
            audio: Arc::new(NormalizedAudio::default()),
            transport: Arc::new(Transport::new()),
            stream: None,
        }
    }

    /// Replace the buffer and reopen the output device for it.
    ///
    /// On device failure the buffer is still installed but there is no stream;
    /// transport calls stay harmless until a later `load` succeeds.
    pub fn load(&mut self, audio: Arc<NormalizedAudio>) -> AudioResult<()> {
        // The old callback must be gone before the buffer is swapped.
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                log::warn!("Failed to pause stream before reload: {}", err);
            }
            drop(stream);
        }

        self.transport.reset();
        self.audio = audio;

        let renderer = PcmRenderer::new(Arc::clone(&self.audio), Arc::clone(&self.transport));
        match self.host.open(renderer) {
            Ok(stream) => {
                log::info!(
                    "Loaded {} frames ({:.2}s) for playback",
                    self.audio.frame_count(),
                    self.audio.duration()
                );
                self.stream = Some(stream);
                Ok(())
            }
            Err(err) => {
                log::error!("Failed to open audio output: {}", err);
                Err(err)
            }
        }
    }

    pub fn play(&mut self) -> AudioResult<()> {
        let Some(stream) = self.stream.as_ref() else {
            return Ok(());
        };
        if self.audio.is_empty() {
            return Ok(());
        }

        if self.transport.state() == PlaybackState::Stopped
            && self.transport.position() >= self.audio.byte_len()
        {
            self.transport.set_position(0);
        }

        self.transport.set_state(PlaybackState::Playing);
        if let Err(err) = stream.play() {
            self.transport.set_state(PlaybackState::Stopped);
            log::error!("Failed to start playback: {}", err);
            return Err(err);
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.transport.state() != PlaybackState::Playing {
            return;
        }
        self.transport.set_state(PlaybackState::Paused);
        self.pause_stream();
    }

    pub fn stop(&mut self) {
        self.transport.set_state(PlaybackState::Stopped);
        self.pause_stream();
        self.transport.set_position(0);
    }

    /// Jump to `fraction` of the track, rounded down to a whole frame.
    pub fn seek(&mut self, fraction: f64) {
        let total = self.audio.byte_len();
        if total == 0 {
            return;
        }
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let bytes = ((fraction * total as f64).floor() as usize).min(total);
        self.transport.set_position(bytes - bytes % BYTES_PER_FRAME);
    }

    /// Play position as a fraction of the track in [0, 1].
    pub fn progress(&self) -> f64 {
        let total = self.audio.byte_len();
        if total == 0 {
            return 0.0;
        }
        (self.transport.position() as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn state(&self) -> PlaybackState {
        self.transport.state()
    }

    pub fn has_audio(&self) -> bool {
        !self.audio.is_empty()
    }

    pub fn has_device(&self) -> bool {
        self.stream.is_some()
    }

    pub fn audio(&self) -> &Arc<NormalizedAudio> {
        &self.audio
    }

    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    pub fn position_secs(&self) -> f64 {
        (self.transport.position() / BYTES_PER_FRAME) as f64 / self.audio.sample_rate() as f64
    }

    fn pause_stream(&self) {
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.pause() {
                log::warn!("{}", err);
            }
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.transport.set_state(PlaybackState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::device::testing::{ManualDevice, ManualHost};
    use std::sync::atomic::Ordering;

    /// One second of a counting ramp so copied bytes are recognizable.
    fn track(frames: usize) -> Arc<NormalizedAudio> {
        let samples = (0..frames * 2).map(|i| (i % 30000) as i16).collect();
        Arc::new(NormalizedAudio::new(samples))
    }

    fn engine_with(frames: usize) -> (PlaybackEngine, Arc<ManualDevice>) {
        let device = Arc::new(ManualDevice::default());
        let mut engine = PlaybackEngine::new(Box::new(ManualHost(Arc::clone(&device))));
        engine.load(track(frames)).unwrap();
        (engine, device)
    }

    #[test]
    fn load_resets_to_stopped_at_zero() {
        let (mut engine, device) = engine_with(1000);
        engine.play().unwrap();
        device.pull(400);
        engine.load(track(500)).unwrap();

        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.progress(), 0.0);
        assert!(engine.has_audio());
        assert_eq!(*device.opened.lock().unwrap(), 2);
        assert!(!device.is_running());
    }

    #[test]
    fn seek_then_progress_is_within_one_frame() {
        let (mut engine, _device) = engine_with(44_100);
        let frame_fraction = BYTES_PER_FRAME as f64 / engine.audio().byte_len() as f64;
        for i in 0..=100 {
            let fraction = i as f64 / 100.0;
            engine.seek(fraction);
            let progress = engine.progress();
            assert!(
                (progress - fraction).abs() <= frame_fraction,
                "seek({}) -> progress {}",
                fraction,
                progress
            );
        }
    }

    #[test]
    fn seek_is_idempotent_and_frame_aligned() {
        let (mut engine, device) = engine_with(12_345);
        engine.seek(0.377);
        let first = engine.progress();
        engine.seek(0.377);
        assert_eq!(engine.progress(), first);

        engine.play().unwrap();
        let block = device.pull(8);
        // Aligned start: the first sample pulled is a left-channel sample.
        let pos_samples = (first * engine.audio().byte_len() as f64).round() as usize / 2;
        assert_eq!(pos_samples % 2, 0);
        assert_eq!(i16::from_ne_bytes([block[0], block[1]]), engine.audio().samples()[pos_samples]);
    }

    #[test]
    fn seek_clamps_out_of_range() {
        let (mut engine, _device) = engine_with(100);
        engine.seek(-4.0);
        assert_eq!(engine.progress(), 0.0);
        engine.seek(9.0);
        assert_eq!(engine.progress(), 1.0);
        engine.seek(f64::NAN);
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn seek_keeps_state() {
        let (mut engine, _device) = engine_with(100);
        engine.play().unwrap();
        engine.seek(0.5);
        assert_eq!(engine.state(), PlaybackState::Playing);
        engine.pause();
        engine.seek(0.25);
        assert_eq!(engine.state(), PlaybackState::Paused);
    }

    #[test]
    fn pause_then_play_resumes_where_it_was() {
        let (mut engine, device) = engine_with(1000);
        engine.play().unwrap();
        assert!(device.is_running());
        device.pull(1600);
        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert!(!device.is_running());
        let paused_at = engine.progress();
        assert!(paused_at > 0.0);

        // Device pulls while paused are silent and do not move the position.
        assert!(device.pull(64).iter().all(|&b| b == 0));
        assert_eq!(engine.progress(), paused_at);

        engine.play().unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.progress(), paused_at);
        let block = device.pull(4);
        assert_eq!(i16::from_ne_bytes([block[0], block[1]]), engine.audio().samples()[800]);
    }

    #[test]
    fn pause_only_applies_while_playing() {
        let (mut engine, _device) = engine_with(100);
        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn natural_end_then_play_restarts() {
        let (mut engine, device) = engine_with(10);
        engine.play().unwrap();
        let block = device.pull(64);
        assert_eq!(block.len(), 64);
        assert!(block[40..].iter().all(|&b| b == 0));
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.progress(), 1.0);

        engine.play().unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn seek_after_natural_end_is_respected() {
        let (mut engine, device) = engine_with(10);
        engine.play().unwrap();
        device.pull(64);
        engine.seek(0.5);
        engine.play().unwrap();
        assert_eq!(engine.progress(), 0.5);
    }

    #[test]
    fn stop_always_rewinds() {
        let (mut engine, device) = engine_with(1000);
        engine.stop();
        assert_eq!((engine.state(), engine.progress()), (PlaybackState::Stopped, 0.0));

        engine.play().unwrap();
        device.pull(400);
        engine.stop();
        assert_eq!((engine.state(), engine.progress()), (PlaybackState::Stopped, 0.0));
        assert!(!device.is_running());

        engine.play().unwrap();
        device.pull(400);
        engine.pause();
        engine.stop();
        assert_eq!((engine.state(), engine.progress()), (PlaybackState::Stopped, 0.0));

        engine.seek(1.0);
        engine.stop();
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn empty_buffer_is_inert() {
        let (mut engine, device) = engine_with(0);
        assert!(!engine.has_audio());
        engine.play().unwrap();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert!(!device.is_running());
        engine.seek(0.5);
        assert_eq!(engine.progress(), 0.0);
    }

    #[test]
    fn failed_open_leaves_engine_inert() {
        let device = Arc::new(ManualDevice::default());
        device.fail_open.store(true, Ordering::SeqCst);
        let mut engine = PlaybackEngine::new(Box::new(ManualHost(Arc::clone(&device))));

        assert!(engine.load(track(100)).is_err());
        assert!(engine.has_audio());
        assert!(!engine.has_device());
        engine.play().unwrap();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        engine.pause();
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);

        device.fail_open.store(false, Ordering::SeqCst);
        engine.load(track(100)).unwrap();
        engine.play().unwrap();
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    #[test]
    fn failed_start_reverts_to_stopped() {
        let (mut engine, device) = engine_with(100);
        device.fail_play.store(true, Ordering::SeqCst);
        assert!(engine.play().is_err());
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn position_in_seconds_tracks_frames() {
        let (mut engine, _device) = engine_with(44_100 * 2);
        engine.seek(0.5);
        assert!((engine.position_secs() - 1.0).abs() < 1e-4);
        assert!((engine.duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn transport_holds_up_against_a_live_callback() {
        use std::sync::atomic::AtomicBool;
        use std::thread;
        use std::time::{Duration, Instant};

        let (mut engine, device) = engine_with(2_000);
        let renderer = device.renderer.lock().unwrap().clone().unwrap();
        let total = engine.audio().byte_len();
        let done = Arc::new(AtomicBool::new(false));
        let callback = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut out = vec![0u8; 256];
                let mut pulls = 0u64;
                while !done.load(Ordering::Relaxed) {
                    renderer.render(&mut out);
                    pulls += 1;
                }
                pulls
            })
        };

        for round in 0..2_000 {
            engine.play().unwrap();
            engine.seek((round % 10) as f64 / 10.0);
            thread::yield_now();
            let position = engine.transport.position();
            assert_eq!(position % BYTES_PER_FRAME, 0);
            assert!(position <= total);

            if round % 3 == 0 {
                engine.pause();
            }
            engine.stop();
            assert_eq!(engine.state(), PlaybackState::Stopped);
            assert_eq!(engine.transport.position(), 0);
            thread::yield_now();
            assert_eq!(engine.transport.position(), 0);
        }

        // Run off the end: one transition to Stopped, parked on the last byte.
        engine.seek(0.99);
        engine.play().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.state() == PlaybackState::Playing {
            assert!(Instant::now() < deadline, "track never finished");
            thread::yield_now();
        }
        assert_eq!(engine.transport.position(), total);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.transport.position(), total);

        done.store(true, Ordering::Relaxed);
        assert!(callback.join().unwrap() > 0);
    }
}
