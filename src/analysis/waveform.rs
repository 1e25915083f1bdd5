use serde::{Deserialize, Serialize};

pub const DEFAULT_COLUMNS: usize = 2000;

/// Min/max pairs, one per output column, for resolution-independent drawing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveformEnvelope {
    columns: Vec<(f32, f32)>,
}

impl WaveformEnvelope {
    pub fn columns(&self) -> &[(f32, f32)] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Largest absolute excursion, handy for scaling a display.
    pub fn peak(&self) -> f32 {
        self.columns
            .iter()
            .map(|&(min, max)| min.abs().max(max.abs()))
            .fold(0.0f32, f32::max)
    }
}

/// Reduce `mono` to exactly `columns` (min, max) pairs.
///
/// Returns `None` for empty input or zero columns. Columns narrower than one
/// sample are widened to one.
pub fn build_envelope(mono: &[f32], columns: usize) -> Option<WaveformEnvelope> {
    let len = mono.len();
    if len == 0 || columns == 0 {
        return None;
    }

    let columns = (0..columns)
        .map(|col| {
            let mut start = (col as u64 * len as u64 / columns as u64) as usize;
            let mut end = (((col + 1) as u64 * len as u64 / columns as u64) as usize).min(len);
            if end <= start {
                start = start.min(len - 1);
                end = start + 1;
            }
            mono[start..end]
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)))
        })
        .collect();

    Some(WaveformEnvelope { columns })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_independent_of_input_size() {
        let short = vec![0.1f32; 100];
        assert_eq!(build_envelope(&short, DEFAULT_COLUMNS).unwrap().len(), DEFAULT_COLUMNS);

        let long = vec![0.1f32; 10_000_000];
        assert_eq!(build_envelope(&long, DEFAULT_COLUMNS).unwrap().len(), DEFAULT_COLUMNS);
    }

    #[test]
    fn records_min_and_max_per_column() {
        let mono = [0.0, 1.0, -0.5, 0.25, -1.0, 0.5];
        let env = build_envelope(&mono, 3).unwrap();
        assert_eq!(env.columns(), &[(0.0, 1.0), (-0.5, 0.25), (-1.0, 0.5)]);
        assert_eq!(env.peak(), 1.0);
    }

    #[test]
    fn narrow_columns_take_one_sample() {
        let env = build_envelope(&[0.3, -0.7], 5).unwrap();
        assert_eq!(env.len(), 5);
        for &(min, max) in env.columns() {
            assert!(min.is_finite() && max.is_finite());
            assert!(min <= max);
        }
        assert_eq!(env.columns()[0], (0.3, 0.3));
        assert_eq!(env.columns()[4], (-0.7, -0.7));
    }

    #[test]
    fn empty_input_leaves_envelope_unset() {
        assert!(build_envelope(&[], 10).is_none());
        assert!(build_envelope(&[0.5], 0).is_none());
    }

    #[test]
    fn serializes_as_pairs() {
        let env = build_envelope(&[0.5, -0.5], 1).unwrap();
        assert_eq!(serde_json::to_string(&env).unwrap(), "[[-0.5,0.5]]");
    }
}
