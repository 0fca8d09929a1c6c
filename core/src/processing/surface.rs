use ndarray::Array1;

use crate::math::StatsHelper;
use crate::record::{beam_median, InstrumentRecord, SurfaceMethod, SurfaceSeries};

/// Share of ensembles that must carry a surface-track range before it is trusted.
pub const MIN_SURFACE_TRACK_FRACTION: f64 = 0.1;
/// Echo intensity scale of the instrument (dB per count).
const DB_PER_COUNT: f64 = 0.45;

/// How the up-looker locates the sea surface, chosen by data availability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceStrategy {
    /// Ranges from the instrument's own bottom-track (surface-track) pings.
    SurfaceTrack,
    /// Bin of maximum spreading-corrected echo per ensemble.
    EchoMaximum { min_excess: f64 },
}

impl SurfaceStrategy {
    /// Surface track when enough finite, positive ranges exist; echo maximum otherwise.
    pub fn select(record: &InstrumentRecord, min_excess: f64) -> Self {
        let usable = record.bottom_track.as_ref().map_or(false, |bt| {
            let ranges = bt.median_range();
            let finite = StatsHelper::count_finite(ranges.iter().copied());
            let sum: f64 = ranges.iter().filter(|r| r.is_finite()).sum();
            finite > 0
                && finite as f64 >= MIN_SURFACE_TRACK_FRACTION * record.n_ensembles() as f64
                && sum > 0.0
        });
        if usable {
            SurfaceStrategy::SurfaceTrack
        } else {
            SurfaceStrategy::EchoMaximum { min_excess }
        }
    }

    pub fn detect(&self, record: &InstrumentRecord) -> SurfaceSeries {
        match *self {
            SurfaceStrategy::SurfaceTrack => SurfaceSeries {
                method: SurfaceMethod::SurfaceTrack,
                range: surface_track_range(record),
            },
            SurfaceStrategy::EchoMaximum { min_excess } => SurfaceSeries {
                method: SurfaceMethod::EchoMaximum,
                range: echo_maximum_range(record, min_excess),
            },
        }
    }
}

fn surface_track_range(record: &InstrumentRecord) -> Array1<f64> {
    match &record.bottom_track {
        Some(bt) => bt.median_range(),
        None => Array1::from_elem(record.n_ensembles(), f64::NAN),
    }
}

/// Peaks in the first or last bin, or less than `min_excess` counts above
/// the profile median, are not accepted as the surface.
fn echo_maximum_range(record: &InstrumentRecord, min_excess: f64) -> Array1<f64> {
    let echo = beam_median(&record.echo_amplitude);
    let n_bins = record.n_bins();
    let spreading: Vec<f64> = (0..n_bins)
        .map(|k| 20.0 * record.leader.bin_distance(k).max(f64::MIN_POSITIVE).log10() / DB_PER_COUNT)
        .collect();

    echo.outer_iter()
        .map(|row| {
            let corrected: Vec<f64> = row.iter().zip(&spreading).map(|(e, s)| e + s).collect();
            let peak = corrected
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(k, _)| k);
            let peak = match peak {
                Some(k) if k > 0 && k + 1 < n_bins => k,
                _ => return f64::NAN,
            };
            let median = StatsHelper::nanmedian(corrected.iter().copied());
            if corrected[peak] - median < min_excess {
                return f64::NAN;
            }
            record.leader.bin_distance(peak)
        })
        .collect()
}
