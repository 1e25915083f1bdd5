//! Real-time render callback.
//!
//! `PcmRenderer::render` runs on the device thread. It touches only the two
//! transport atomics and the immutable PCM buffer: no locks, no allocation,
//! no logging.

use std::sync::Arc;

use super::transport::{PlaybackState, Transport};
use crate::audio::pcm::BYTES_PER_FRAME;
use crate::audio::NormalizedAudio;

/// Cheap to clone; every clone reads the same buffer and transport.
#[derive(Clone)]
pub struct PcmRenderer {
    audio: Arc<NormalizedAudio>,
    transport: Arc<Transport>,
}

impl PcmRenderer {
    pub fn new(audio: Arc<NormalizedAudio>, transport: Arc<Transport>) -> Self {
        Self { audio, transport }
    }

    pub fn channels(&self) -> u16 {
        self.audio.channels()
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate()
    }

    /// Fill `out` with the next bytes of PCM, or silence.
    ///
    /// Only whole frames are copied; a trailing partial frame is silent and
    /// does not move the position.
    pub fn render(&self, out: &mut [u8]) {
        // Cursor before state: a stop() landing after this read fails the
        // advance below, one landing before it shows up in the state.
        let cursor = self.transport.cursor();
        if self.transport.state() != PlaybackState::Playing {
            out.fill(0);
            return;
        }

        let pcm = self.audio.as_bytes();
        let total = pcm.len();
        let position = cursor.bytes();
        if position >= total {
            out.fill(0);
            if self.transport.advance(cursor, position) {
                self.transport.finish();
            }
            return;
        }

        let wanted = out.len() - out.len() % BYTES_PER_FRAME;
        let copied = wanted.min(total - position);
        out[..copied].copy_from_slice(&pcm[position..position + copied]);
        out[copied..].fill(0);

        if copied < wanted {
            if self.transport.advance(cursor, total) {
                self.transport.finish();
            }
        } else {
            self.transport.advance(cursor, position + copied);
        }
    }

    /// Render into an i16 block, the native sample type of the buffer.
    pub fn render_i16(&self, out: &mut [i16]) {
        self.render(bytemuck::cast_slice_mut(out));
    }
}
