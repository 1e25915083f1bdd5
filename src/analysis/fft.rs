use rustfft::num_complex::Complex;

/// In-place iterative radix-2 FFT of a fixed power-of-two size.
///
/// Twiddle factors are computed once in f64 and shared by every stage: the
/// stage of block length `len` uses every `size / len`-th entry of the table.
pub struct Radix2Fft {
    size: usize,
    twiddles: Vec<Complex<f32>>,
}

impl Radix2Fft {
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "FFT size must be a power of two, got {}", size);
        let twiddles = (0..size / 2)
            .map(|k| {
                let angle = -2.0 * std::f64::consts::PI * k as f64 / size as f64;
                Complex::new(angle.cos() as f32, angle.sin() as f32)
            })
            .collect();
        Self { size, twiddles }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform, unnormalized.
    pub fn process(&self, buf: &mut [Complex<f32>]) {
        let n = self.size;
        assert_eq!(buf.len(), n, "buffer length must match FFT size");

        // Bit-reversal permutation
        let mut j = 0usize;
        for i in 1..n {
            let mut bit = n >> 1;
            while j & bit != 0 {
                j ^= bit;
                bit >>= 1;
            }
            j ^= bit;
            if i < j {
                buf.swap(i, j);
            }
        }

        // Butterflies
        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for block in buf.chunks_exact_mut(len) {
                let (lo, hi) = block.split_at_mut(half);
                for k in 0..half {
                    let w = self.twiddles[k * stride];
                    let u = lo[k];
                    let v = hi[k] * w;
                    lo[k] = u + v;
                    hi[k] = u - v;
                }
            }
            len <<= 1;
        }
    }
}

pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;

    #[test]
    fn matches_reference_fft() {
        let size = 1024;
        let input: Vec<Complex<f32>> = (0..size)
            .map(|i| {
                let t = i as f32 / size as f32;
                let v = (2.0 * std::f32::consts::PI * 37.0 * t).sin()
                    + 0.3 * (2.0 * std::f32::consts::PI * 201.0 * t).cos()
                    + 0.01 * (i % 7) as f32;
                Complex::new(v, 0.0)
            })
            .collect();

        let mut ours = input.clone();
        Radix2Fft::new(size).process(&mut ours);

        let mut reference = input;
        FftPlanner::<f32>::new().plan_fft_forward(size).process(&mut reference);

        for (a, b) in ours.iter().zip(reference.iter()) {
            assert!((a - b).norm() < 1e-2, "ours={} reference={}", a, b);
        }
    }

    #[test]
    fn impulse_has_flat_spectrum() {
        let mut buf = vec![Complex::new(0.0f32, 0.0); 16];
        buf[0] = Complex::new(1.0, 0.0);
        Radix2Fft::new(16).process(&mut buf);
        for c in &buf {
            assert!((c.norm() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn hann_is_zero_at_edges_and_one_in_middle() {
        let w = hann_window(9);
        assert!(w[0].abs() < 1e-6);
        assert!(w[8].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    fn rejects_non_power_of_two() {
        Radix2Fft::new(1000);
    }
}
