use rayon::prelude::*;
use rustfft::num_complex::Complex;

use super::fft::{hann_window, Radix2Fft};

pub const FFT_SIZE: usize = 4096;
pub const HOP_SIZE: usize = 256;
pub const FREQ_BINS: usize = 1024;
pub const MIN_FREQ: f32 = 20.0;
pub const DB_MIN: f32 = -80.0;
pub const DB_MAX: f32 = 0.0;

/// Magnitudes at or below this are treated as silence.
const SILENCE_FLOOR: f32 = 1e-10;

/// Log-frequency dB grid, one column per hop.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrogramData {
    pub cols: usize,
    pub freq_bins: usize,
    /// Row-major: `db[col * freq_bins + bin]`
    pub db: Vec<f32>,
    pub db_min: f32,
    pub db_max: f32,
}

impl SpectrogramData {
    pub fn empty() -> Self {
        Self {
            cols: 0,
            freq_bins: FREQ_BINS,
            db: Vec::new(),
            db_min: DB_MIN,
            db_max: DB_MAX,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0
    }

    pub fn get(&self, col: usize, bin: usize) -> f32 {
        self.db[col * self.freq_bins + bin]
    }

    pub fn column(&self, col: usize) -> &[f32] {
        &self.db[col * self.freq_bins..(col + 1) * self.freq_bins]
    }
}

/// `FREQ_BINS + 1` indices into the positive half-spectrum, log-spaced
/// from `MIN_FREQ` to Nyquist.
fn bin_edges(sample_rate: u32) -> Vec<usize> {
    let nyquist = sample_rate as f64 / 2.0;
    let half = FFT_SIZE / 2;
    let span = nyquist.ln() - (MIN_FREQ as f64).ln();
    (0..=FREQ_BINS)
        .map(|i| {
            // Measured down from Nyquist so the last edge is exactly `half`.
            let t = i as f64 / FREQ_BINS as f64 - 1.0;
            let idx = (half as f64 * (t * span).exp()).floor();
            (idx.max(0.0) as usize).min(half)
        })
        .collect()
}

fn magnitude_to_db(avg: f32) -> f32 {
    // `!(avg > floor)` also catches NaN
    if !(avg > SILENCE_FLOOR) {
        return DB_MIN;
    }
    (20.0 * (avg / FFT_SIZE as f32).log10()).clamp(DB_MIN, DB_MAX)
}

/// Per-thread scratch so each rayon worker allocates its buffers once.
struct ColumnScratch {
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl ColumnScratch {
    fn new(fft_size: usize) -> Self {
        Self {
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            magnitudes: vec![0.0; fft_size / 2 + 1],
        }
    }
}

pub fn compute_spectrogram(mono: &[f32], sample_rate: u32) -> SpectrogramData {
    let n = mono.len();
    if n < FFT_SIZE {
        log::debug!("Track too short for spectrogram ({} < {} samples)", n, FFT_SIZE);
        return SpectrogramData::empty();
    }

    let window = hann_window(FFT_SIZE);
    let edges = bin_edges(sample_rate);
    let fft = Radix2Fft::new(FFT_SIZE);
    let cols = (n - FFT_SIZE) / HOP_SIZE + 1;

    log::info!(
        "Computing spectrogram: {} columns x {} bins (fft={}, hop={})",
        cols, FREQ_BINS, FFT_SIZE, HOP_SIZE
    );

    let mut db = vec![DB_MIN; cols * FREQ_BINS];
    db.par_chunks_mut(FREQ_BINS)
        .enumerate()
        .for_each_init(|| ColumnScratch::new(fft.size()), |scratch, (col, row)| {
            let start = col * HOP_SIZE;
            let slice = &mono[start..start + FFT_SIZE];
            for ((c, &s), &w) in scratch.spectrum.iter_mut().zip(slice).zip(&window) {
                *c = Complex::new(s * w, 0.0);
            }
            fft.process(&mut scratch.spectrum);
            for (m, c) in scratch.magnitudes.iter_mut().zip(&scratch.spectrum) {
                *m = (c.re * c.re + c.im * c.im).sqrt();
            }

            let mags = &scratch.magnitudes;
            for (bin, out) in row.iter_mut().enumerate() {
                let lo = edges[bin];
                let mut hi = edges[bin + 1];
                if hi <= lo {
                    hi = lo + 1;
                }
                let hi = hi.min(mags.len());
                let lo = lo.min(hi - 1);
                let avg = mags[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
                *out = magnitude_to_db(avg);
            }
        });

    SpectrogramData {
        cols,
        freq_bins: FREQ_BINS,
        db,
        db_min: DB_MIN,
        db_max: DB_MAX,
    }
}
