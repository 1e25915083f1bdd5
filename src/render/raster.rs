use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use super::colormap::ColorMap;
use crate::analysis::SpectrogramData;

/// RGBA raster of a spectrogram. Column `x` is one hop; row 0 is the highest bin.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrogramImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl SpectrogramImage {
    pub fn render(data: &SpectrogramData, color_map: ColorMap) -> Self {
        if data.is_empty() {
            return Self {
                width: 0,
                height: 0,
                rgba: Vec::new(),
            };
        }

        let (width, height) = (data.cols, data.freq_bins);
        let range = data.db_max - data.db_min;
        let mut rgba = vec![0u8; width * height * 4];

        for col in 0..width {
            for (bin, &db) in data.column(col).iter().enumerate() {
                let y = height - 1 - bin;
                let t = (db - data.db_min) / range;
                let offset = (y * width + col) * 4;
                rgba[offset..offset + 4].copy_from_slice(&color_map.sample(t));
            }
        }

        Self {
            width: width as u32,
            height: height as u32,
            rgba,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        [
            self.rgba[offset],
            self.rgba[offset + 1],
            self.rgba[offset + 2],
            self.rgba[offset + 3],
        ]
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        anyhow::ensure!(!self.is_empty(), "Spectrogram is empty, nothing to write");
        let img = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .context("RGBA buffer does not match image dimensions")?;
        img.save(path)
            .with_context(|| format!("Failed to write image: {}", path.display()))?;
        log::info!("Wrote {}x{} spectrogram to {}", self.width, self.height, path.display());
        Ok(())
    }
}

/// Holds the current track's spectrogram and the last rendered image,
/// re-rendering only when the data or the color map changes.
#[derive(Default)]
pub struct SpectrogramView {
    data: Option<Arc<SpectrogramData>>,
    color_map: ColorMap,
    cached: Option<Arc<SpectrogramImage>>,
}

impl SpectrogramView {
    pub fn new(color_map: ColorMap) -> Self {
        Self {
            data: None,
            color_map,
            cached: None,
        }
    }

    pub fn set_data(&mut self, data: SpectrogramData) {
        self.data = Some(Arc::new(data));
        self.cached = None;
    }

    pub fn color_map(&self) -> ColorMap {
        self.color_map
    }

    pub fn set_color_map(&mut self, color_map: ColorMap) {
        if self.color_map != color_map {
            self.color_map = color_map;
            self.cached = None;
        }
    }

    /// Rendered image for the current data, or `None` before any data arrives.
    pub fn image(&mut self) -> Option<Arc<SpectrogramImage>> {
        let data = self.data.as_ref()?;
        if self.cached.is_none() {
            self.cached = Some(Arc::new(SpectrogramImage::render(data, self.color_map)));
        }
        self.cached.clone()
    }
}
