use ndarray::{s, Array1, Array2, ArrayView2, Axis};

use crate::math::StatsHelper;
use crate::record::instrument::VERTICAL;
use crate::record::InstrumentRecord;

/// Derived quantities reported alongside the merged profile.
pub struct Diagnostics;

impl Diagnostics {
    /// Angle between the instrument axis and vertical (degrees).
    pub fn tilt(pitch: &Array1<f64>, roll: &Array1<f64>) -> Array1<f64> {
        pitch
            .iter()
            .zip(roll.iter())
            .map(|(p, r)| {
                let c = (p.to_radians().cos() * r.to_radians().cos()).clamp(-1.0, 1.0);
                c.acos().to_degrees()
            })
            .collect()
    }

    /// Tilt change between consecutive ensembles. The first ensemble has no
    /// predecessor and is NaN.
    pub fn tilt_rate(tilt: &Array1<f64>) -> Array1<f64> {
        let mut rate = Array1::from_elem(tilt.len(), f64::NAN);
        for k in 1..tilt.len() {
            rate[k] = (tilt[k] - tilt[k - 1]).abs();
        }
        rate
    }

    /// Correlation normalized by its largest finite value.
    pub fn weight(correlation: &Array2<f64>) -> Array2<f64> {
        let max = StatsHelper::nanmax(correlation.iter().copied());
        if !max.is_finite() || max <= 0.0 {
            return Array2::from_elem(correlation.raw_dim(), f64::NAN);
        }
        correlation.mapv(|c| c / max)
    }

    /// Expected horizontal velocity error of a single ping.
    ///
    /// Uses the spread of vertical velocity over `bins` bins starting at the
    /// second bin, where shear is small. The per-ensemble spread is reduced
    /// by its median, scaled by the pings per ensemble, and projected from
    /// vertical to horizontal through the beam angle.
    pub fn single_ping_error(record: &InstrumentRecord, bins: usize) -> f64 {
        let n_bins = record.n_bins();
        let start = 1.min(n_bins);
        let end = (start + bins).min(n_bins);
        if end - start < 2 {
            return f64::NAN;
        }
        let w = record.velocity.index_axis(Axis(2), VERTICAL);
        let spread: Vec<f64> = w
            .slice(s![.., start..end])
            .outer_iter()
            .map(|row| StatsHelper::nanstd(row.iter().copied()))
            .collect();
        let median = StatsHelper::nanmedian(spread);
        let pings = f64::from(record.leader.pings_per_ensemble.max(1));
        median * pings.sqrt() * std::f64::consts::SQRT_2 / record.leader.beam_angle.to_radians().tan()
    }

    /// Share of samples with vertical velocity but no error velocity,
    /// i.e. three-beam solutions. NaN when no vertical velocity exists.
    pub fn three_beam_fraction(w: ArrayView2<f64>, error: ArrayView2<f64>) -> f64 {
        let mut valid = 0usize;
        let mut three_beam = 0usize;
        for (wv, ev) in w.iter().zip(error.iter()) {
            if wv.is_finite() {
                valid += 1;
                if ev.is_nan() {
                    three_beam += 1;
                }
            }
        }
        if valid == 0 {
            f64::NAN
        } else {
            three_beam as f64 / valid as f64
        }
    }
}
