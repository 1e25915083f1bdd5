pub mod fft;
pub mod spectrogram;
pub mod waveform;
pub mod worker;

pub use spectrogram::{compute_spectrogram, SpectrogramData};
pub use waveform::{build_envelope, WaveformEnvelope};
pub use worker::{AnalysisWorker, TrackAnalysis, WorkerError};
