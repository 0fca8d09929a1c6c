use crate::math::StatsHelper;
use crate::params::ResampleMode;
use crate::record::InstrumentRecord;

pub const SECONDS_PER_DAY: f64 = 86_400.0;
/// Ensembles further apart than this are never paired (s).
pub const MAX_PAIRING_GAP_S: f64 = 1.0;

/// Places two free-running instruments on a common ensemble index.
#[derive(Debug, Clone, Copy)]
pub struct TimeAligner {
    tolerance_days: f64,
    mode: ResampleMode,
}

/// Both records on one clock, plus the number of target ensembles left unpaired.
pub struct Resampled {
    pub down: InstrumentRecord,
    pub up: InstrumentRecord,
    pub unpaired: usize,
}

impl TimeAligner {
    pub fn new(tolerance_s: f64, mode: ResampleMode) -> Self {
        Self {
            tolerance_days: tolerance_s / SECONDS_PER_DAY,
            mode,
        }
    }

    /// Compares ping intervals within and between instruments.
    /// Returns one warning per detected mismatch.
    pub fn check_ping_rates(&self, down_times: &[f64], up_times: &[f64]) -> Vec<String> {
        let mut warnings = Vec::new();
        let down_dt = intervals(down_times);
        let up_dt = intervals(up_times);

        for (name, dt) in [("down-looker", &down_dt), ("up-looker", &up_dt)] {
            let range = spread(dt);
            if range > self.tolerance_days {
                warnings.push(format!(
                    "{} ping interval varies by {:.3} s",
                    name,
                    range * SECONDS_PER_DAY
                ));
            }
        }

        let down_median = StatsHelper::nanmedian(down_dt.iter().copied());
        let up_median = StatsHelper::nanmedian(up_dt.iter().copied());
        if (down_median - up_median).abs() > self.tolerance_days {
            warnings.push(format!(
                "ping rates differ: down-looker {:.3} s, up-looker {:.3} s",
                down_median * SECONDS_PER_DAY,
                up_median * SECONDS_PER_DAY
            ));
        }
        warnings
    }

    /// Nearest-neighbour index into `source` for every `target` time.
    ///
    /// Indices clamp at the ends of `source`; a pairing more than
    /// [`MAX_PAIRING_GAP_S`] apart is `None`.
    pub fn nearest_indices(target: &[f64], source: &[f64]) -> Vec<Option<usize>> {
        let max_gap = MAX_PAIRING_GAP_S / SECONDS_PER_DAY;
        target
            .iter()
            .map(|&t| {
                if source.is_empty() || !t.is_finite() {
                    return None;
                }
                let pos = source.partition_point(|&s| s < t);
                let candidates = [pos.saturating_sub(1), pos.min(source.len() - 1)];
                let best = candidates
                    .into_iter()
                    .min_by(|&a, &b| (source[a] - t).abs().total_cmp(&(source[b] - t).abs()))?;
                if (source[best] - t).abs() <= max_gap {
                    Some(best)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Moves one instrument onto the other's timestamps according to the mode.
    pub fn resample(&self, down: InstrumentRecord, up: InstrumentRecord) -> Resampled {
        match self.mode {
            ResampleMode::None => Resampled {
                down,
                up,
                unpaired: 0,
            },
            ResampleMode::UpToDown => {
                let target = down.times();
                let indices = Self::nearest_indices(&target, &up.times());
                let unpaired = indices.iter().filter(|i| i.is_none()).count();
                Resampled {
                    up: up.reindex(&indices, &target),
                    down,
                    unpaired,
                }
            }
            ResampleMode::DownToUp => {
                let target = up.times();
                let indices = Self::nearest_indices(&target, &down.times());
                let unpaired = indices.iter().filter(|i| i.is_none()).count();
                Resampled {
                    down: down.reindex(&indices, &target),
                    up,
                    unpaired,
                }
            }
        }
    }
}

fn intervals(times: &[f64]) -> Vec<f64> {
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

fn spread(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
    max - min
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::instrument::VERTICAL;
    use crate::testing::earth_record;

    fn seconds(values: &[f64]) -> Vec<f64> {
        values.iter().map(|s| 100.0 + s / SECONDS_PER_DAY).collect()
    }

    #[test]
    fn matching_ping_rates_raise_no_warning() {
        let times = seconds(&[0.0, 1.0, 2.0, 3.0]);
        let aligner = TimeAligner::new(0.05, ResampleMode::None);
        assert!(aligner.check_ping_rates(&times, &times).is_empty());
    }

    #[test]
    fn different_ping_rates_are_reported() {
        let down = seconds(&[0.0, 1.0, 2.0, 3.0]);
        let up = seconds(&[0.0, 1.5, 3.0, 4.5]);
        let warnings = TimeAligner::new(0.05, ResampleMode::None).check_ping_rates(&down, &up);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("ping rates differ"));
    }

    #[test]
    fn irregular_pinging_is_reported() {
        let down = seconds(&[0.0, 1.0, 2.5, 3.5]);
        let up = seconds(&[0.0, 1.0, 2.0, 3.0]);
        let warnings = TimeAligner::new(0.05, ResampleMode::None).check_ping_rates(&down, &up);
        assert!(warnings.iter().any(|w| w.starts_with("down-looker")));
    }

    #[test]
    fn nearest_pairs_stay_within_one_second() {
        let source = seconds(&[0.0, 1.2, 2.4, 3.6, 4.8]);
        let target = seconds(&[0.1, 1.0, 2.0, 5.5, 9.0]);
        let indices = TimeAligner::nearest_indices(&target, &source);
        assert_eq!(indices, vec![Some(0), Some(1), Some(2), Some(4), None]);
        for (t, idx) in target.iter().zip(&indices) {
            if let Some(i) = idx {
                assert!((source[*i] - t).abs() * SECONDS_PER_DAY <= MAX_PAIRING_GAP_S);
            }
        }
    }

    #[test]
    fn resample_up_to_down_uses_down_timestamps() {
        let mut down = earth_record(4, 2, 0.0);
        let mut up = earth_record(3, 2, 0.0);
        for (i, e) in down.ensembles.iter_mut().enumerate() {
            e.time = 100.0 + i as f64 / SECONDS_PER_DAY;
        }
        for (i, e) in up.ensembles.iter_mut().enumerate() {
            e.time = 100.0 + (0.1 + i as f64) / SECONDS_PER_DAY;
            up.velocity[[i, 0, VERTICAL]] = i as f64;
        }
        // the last down ensemble is 2.9 s past the final up ping
        down.ensembles[3].time = 100.0 + 5.0 / SECONDS_PER_DAY;

        let aligned = TimeAligner::new(0.05, ResampleMode::UpToDown).resample(down, up);
        assert_eq!(aligned.up.n_ensembles(), 4);
        assert_eq!(aligned.unpaired, 1);
        assert_eq!(aligned.up.velocity[[2, 0, VERTICAL]], 2.0);
        assert!(aligned.up.velocity[[3, 0, VERTICAL]].is_nan());
        assert_eq!(aligned.up.ensembles[3].time, aligned.down.ensembles[3].time);
    }

    #[test]
    fn resample_down_to_up_uses_up_timestamps() {
        let mut down = earth_record(3, 2, 0.0);
        let mut up = earth_record(4, 2, 0.0);
        for (i, e) in down.ensembles.iter_mut().enumerate() {
            e.time = 100.0 + (0.2 + i as f64) / SECONDS_PER_DAY;
            down.velocity[[i, 1, VERTICAL]] = i as f64;
        }
        for (i, e) in up.ensembles.iter_mut().enumerate() {
            e.time = 100.0 + i as f64 / SECONDS_PER_DAY;
        }
        // the last up ensemble is 4.8 s past the final down ping
        up.ensembles[3].time = 100.0 + 7.0 / SECONDS_PER_DAY;

        let aligned = TimeAligner::new(0.05, ResampleMode::DownToUp).resample(down, up);
        assert_eq!(aligned.down.n_ensembles(), 4);
        assert_eq!(aligned.up.n_ensembles(), 4);
        assert_eq!(aligned.unpaired, 1);
        assert_eq!(aligned.down.velocity[[0, 1, VERTICAL]], 0.0);
        assert_eq!(aligned.down.velocity[[2, 1, VERTICAL]], 2.0);
        assert!(aligned.down.velocity[[3, 1, VERTICAL]].is_nan());
        assert_eq!(aligned.down.ensembles[3].time, aligned.up.ensembles[3].time);
    }
}
