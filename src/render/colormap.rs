use serde::{Deserialize, Serialize};

/// Black, dark blue, purple, red, orange, yellow, white; evenly spaced.
const HEAT_STOPS: [[u8; 3]; 7] = [
    [0, 0, 0],
    [0, 0, 139],
    [128, 0, 128],
    [220, 20, 20],
    [255, 140, 0],
    [255, 230, 0],
    [255, 255, 255],
];

/// Mapping from normalized intensity to RGBA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMap {
    #[default]
    Heat,
    Grayscale,
}

impl ColorMap {
    /// Sample at `t` in [0, 1]; out-of-range and NaN clamp to the ends.
    pub fn sample(&self, t: f32) -> [u8; 4] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            ColorMap::Heat => gradient(&HEAT_STOPS, t),
            ColorMap::Grayscale => {
                let v = (t * 255.0).round() as u8;
                [v, v, v, 255]
            }
        }
    }
}

fn gradient(stops: &[[u8; 3]], t: f32) -> [u8; 4] {
    let segments = (stops.len() - 1) as f32;
    let pos = t * segments;
    let idx = (pos.floor() as usize).min(stops.len() - 2);
    let frac = pos - idx as f32;
    let (a, b) = (stops[idx], stops[idx + 1]);
    let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * frac).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2]), 255]
}
