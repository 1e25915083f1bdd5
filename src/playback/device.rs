//! Seam between the engine and the host audio subsystem.
//!
//! The engine hands a [`PcmRenderer`] to an [`OutputHost`]; the host pulls from
//! it on its own thread at whatever period the device runs. The returned
//! [`OutputStream`] only starts and pauses that pulling.

use super::error::AudioResult;
use super::renderer::PcmRenderer;

/// A running (or paused) output stream. Dropping it tears the device down.
pub trait OutputStream {
    fn play(&self) -> AudioResult<()>;
    fn pause(&self) -> AudioResult<()>;
}

/// Something that can open an output stream fed by a pull callback.
pub trait OutputHost {
    /// Open a stream for the renderer's channel count and sample rate.
    /// The stream may start paused; the renderer emits silence until the
    /// transport says Playing.
    fn open(&mut self, renderer: PcmRenderer) -> AudioResult<Box<dyn OutputStream>>;
}
