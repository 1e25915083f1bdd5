pub mod decode;
pub mod pcm;
pub mod wav;

pub use pcm::{reduce_to_mono, NormalizedAudio};
