pub mod cpal_host;
pub mod device;
pub mod engine;
pub mod error;
pub mod renderer;
pub mod transport;

pub use cpal_host::{list_output_devices, CpalHost, OutputDeviceInfo};
pub use device::{OutputHost, OutputStream};
pub use engine::PlaybackEngine;
pub use error::{AudioError, AudioResult};
pub use renderer::PcmRenderer;
pub use transport::{Cursor, PlaybackState, Transport};
