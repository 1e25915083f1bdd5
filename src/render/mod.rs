pub mod colormap;
pub mod raster;

pub use colormap::ColorMap;
pub use raster::{SpectrogramImage, SpectrogramView};
