//! Background spectrogram/envelope computation.
//!
//! One run at a time: `submit` takes the `computing` flag with a compare-exchange
//! and refuses the request while a run is in flight. Results come back over a
//! channel and are polled from the controller thread. A run cannot be cancelled;
//! `invalidate` marks it stale so its result is dropped on receipt.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use thiserror::Error;

use super::spectrogram::{compute_spectrogram, SpectrogramData};
use super::waveform::{build_envelope, WaveformEnvelope};
use crate::audio::NormalizedAudio;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Analysis already running for track {running}")]
    Busy { running: u64 },

    #[error("Failed to spawn analysis thread: {0}")]
    Spawn(#[from] std::io::Error),
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Starts a job on its own thread.
type Spawner = fn(Job) -> std::io::Result<()>;

fn spawn_named(job: Job) -> std::io::Result<()> {
    thread::Builder::new()
        .name("spectrogram".to_string())
        .spawn(job)
        .map(|_| ())
}

/// Everything the visualization needs for one track.
#[derive(Debug, Clone)]
pub struct TrackAnalysis {
    pub track_id: u64,
    pub spectrogram: SpectrogramData,
    pub envelope: Option<WaveformEnvelope>,
}

struct Finished {
    generation: u64,
    analysis: TrackAnalysis,
}

pub struct AnalysisWorker {
    waveform_columns: usize,
    computing: Arc<AtomicBool>,
    running_track: AtomicU64,
    /// Bumped on every submit and invalidate; results from older runs are stale.
    generation: AtomicU64,
    tx: Sender<Finished>,
    rx: Receiver<Finished>,
    spawn: Spawner,
}

impl AnalysisWorker {
    pub fn new(waveform_columns: usize) -> Self {
        Self::with_spawner(waveform_columns, spawn_named)
    }

    fn with_spawner(waveform_columns: usize, spawn: Spawner) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            waveform_columns,
            computing: Arc::new(AtomicBool::new(false)),
            running_track: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            tx,
            rx,
            spawn,
        }
    }

    pub fn is_computing(&self) -> bool {
        self.computing.load(Ordering::Acquire)
    }

    /// Start analyzing `audio` on a dedicated thread.
    pub fn submit(&self, track_id: u64, audio: Arc<NormalizedAudio>) -> Result<(), WorkerError> {
        if self
            .computing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WorkerError::Busy {
                running: self.running_track.load(Ordering::Acquire),
            });
        }

        self.running_track.store(track_id, Ordering::Release);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let computing = Arc::clone(&self.computing);
        let tx = self.tx.clone();
        let columns = self.waveform_columns;

        let spawned = (self.spawn)(Box::new(move || {
            let started = Instant::now();
            let mono = audio.to_mono();
            let spectrogram = compute_spectrogram(&mono, audio.sample_rate());
            let envelope = build_envelope(&mono, columns);
            log::info!(
                "Analysis of track {} finished in {:.2}s ({} columns)",
                track_id,
                started.elapsed().as_secs_f32(),
                spectrogram.cols
            );

            // Clear the flag before sending so a receiver can resubmit immediately.
            computing.store(false, Ordering::Release);
            let _ = tx.send(Finished {
                generation,
                analysis: TrackAnalysis {
                    track_id,
                    spectrogram,
                    envelope,
                },
            });
        }));

        if let Err(err) = spawned {
            self.computing.store(false, Ordering::Release);
            return Err(err.into());
        }
        Ok(())
    }

    /// Mark any in-flight run as stale. Its result will be dropped.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Non-blocking poll for a finished analysis.
    pub fn try_recv(&self) -> Option<TrackAnalysis> {
        loop {
            match self.rx.try_recv() {
                Ok(finished) => {
                    if let Some(analysis) = self.accept(finished) {
                        return Some(analysis);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Wait up to `timeout` for a finished analysis.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TrackAnalysis> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(finished) => {
                    if let Some(analysis) = self.accept(finished) {
                        return Some(analysis);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn accept(&self, finished: Finished) -> Option<TrackAnalysis> {
        if finished.generation != self.generation.load(Ordering::Acquire) {
            log::debug!(
                "Discarding stale analysis for track {}",
                finished.analysis.track_id
            );
            return None;
        }
        Some(finished.analysis)
    }
}
