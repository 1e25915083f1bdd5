//! Audio audition engine: real-time transport over a normalized PCM buffer,
//! plus offline spectrogram and waveform analysis of the same buffer.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod playback;
pub mod render;
