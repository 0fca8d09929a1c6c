use serde::Serialize;

use crate::math::StatsHelper;

/// Finite pairs needed before a lag's correlation is trusted.
pub const MIN_LAG_OVERLAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagResult {
    /// Series `b` index offset: `a[i]` pairs with `b[i + lag]`.
    pub lag: isize,
    /// Pearson coefficient at `lag`; NaN when no lag had enough overlap.
    pub correlation: f64,
    pub pairs: usize,
}

/// Integer-lag cross-correlation search between two vertical-velocity series.
#[derive(Debug, Clone, Copy)]
pub struct LagCorrelator {
    max_lag: usize,
}

impl LagCorrelator {
    pub fn new(max_lag: usize) -> Self {
        Self { max_lag }
    }

    /// Correlation of `a[i]` with `b[i + lag]` over the finite pairs.
    pub fn correlation_at(a: &[f64], b: &[f64], lag: isize) -> (f64, usize) {
        let (start, end) = overlap(a.len(), b.len(), lag);
        StatsHelper::pearson((start..end).map(|i| (a[i], b[(i as isize + lag) as usize])))
    }

    /// Best lag in `[-max_lag, max_lag]`. Ties go to the smaller |lag|.
    pub fn find_lag(&self, a: &[f64], b: &[f64]) -> LagResult {
        let mut best = LagResult {
            lag: 0,
            correlation: f64::NAN,
            pairs: 0,
        };
        let max_lag = self.max_lag as isize;
        let candidates = std::iter::once(0).chain((1..=max_lag).flat_map(|k| [k, -k]));
        for lag in candidates {
            let (r, pairs) = Self::correlation_at(a, b, lag);
            if pairs < MIN_LAG_OVERLAP || r.is_nan() {
                continue;
            }
            if best.correlation.is_nan() || r > best.correlation {
                best = LagResult {
                    lag,
                    correlation: r,
                    pairs,
                };
            }
        }
        best
    }

    /// Index lists of the overlapping, lag-shifted range.
    pub fn joint_indices(n_a: usize, n_b: usize, lag: isize) -> (Vec<usize>, Vec<usize>) {
        let (start, end) = overlap(n_a, n_b, lag);
        let a: Vec<usize> = (start..end).collect();
        let b = a.iter().map(|&i| (i as isize + lag) as usize).collect();
        (a, b)
    }
}

/// Range of `i` for which both `i` and `i + lag` are valid indices.
fn overlap(n_a: usize, n_b: usize, lag: isize) -> (usize, usize) {
    let start = (-lag).max(0) as usize;
    let end = (n_b as isize - lag).clamp(0, n_a as isize) as usize;
    (start, end.max(start))
}
