use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Transport state shared between the controller and the render callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Playing,
            2 => PlaybackState::Paused,
            _ => PlaybackState::Stopped,
        }
    }
}

const POSITION_BITS: u32 = 48;
const POSITION_MASK: u64 = (1 << POSITION_BITS) - 1;
const EPOCH_MASK: u64 = (1 << (64 - POSITION_BITS)) - 1;

/// A position word as read by the render callback.
///
/// Besides the byte offset it carries the epoch of the last controller store,
/// so an advance based on it fails after any seek, stop or load, even one that
/// wrote the same offset back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(u64);

impl Cursor {
    #[inline]
    pub fn bytes(self) -> usize {
        (self.0 & POSITION_MASK) as usize
    }
}

/// The only mutable state the controller and the device thread share:
/// playback state and a frame-aligned byte position into the PCM buffer.
#[derive(Debug)]
pub struct Transport {
    state: AtomicU8,
    position: AtomicU64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Stopped as u8),
            position: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Playing -> Stopped, unless the controller changed the state meanwhile.
    #[inline]
    pub fn finish(&self) -> bool {
        self.state
            .compare_exchange(
                PlaybackState::Playing as u8,
                PlaybackState::Stopped as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor().bytes()
    }

    #[inline]
    pub fn cursor(&self) -> Cursor {
        Cursor(self.position.load(Ordering::Acquire))
    }

    /// Controller-side store. Starts a new epoch.
    pub fn set_position(&self, bytes: usize) {
        let bytes = bytes as u64 & POSITION_MASK;
        let _ = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let epoch = ((word >> POSITION_BITS) + 1) & EPOCH_MASK;
                Some((epoch << POSITION_BITS) | bytes)
            });
    }

    /// Move the position from `from` to `new` unless it was stored since `from` was read.
    #[inline]
    pub fn advance(&self, from: Cursor, new: usize) -> bool {
        let word = (from.0 & !POSITION_MASK) | (new as u64 & POSITION_MASK);
        self.position
            .compare_exchange(from.0, word, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn reset(&self) {
        self.set_state(PlaybackState::Stopped);
        self.set_position(0);
    }
}
