use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::math::StatsHelper;
use crate::prelude::{StageError, StageResult};
use crate::record::is_sentinel;

/// Channels per bottom-track ensemble: 4 beam ranges then east/north/vertical/error.
pub const BT_CHANNELS: usize = 8;
/// Bottom velocities below this are instrument garbage (m/s).
pub const BT_VELOCITY_FLOOR: f64 = -10.0;

/// Bottom-track ranges (m) and velocities (m/s) with dummies already removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BottomTrack {
    data: Array2<f64>,
    /// Sentinel values converted to NaN when the record was read.
    pub dummy_count: usize,
}

impl BottomTrack {
    /// Converts a raw ensemble × 8 array, replacing sentinel values with NaN.
    pub fn from_raw(raw: Array2<f64>) -> StageResult<Self> {
        if raw.ncols() != BT_CHANNELS {
            return Err(StageError::ShapeMismatch {
                channel: "bottom_track",
                expected: vec![raw.nrows(), BT_CHANNELS],
                found: raw.shape().to_vec(),
            });
        }
        let mut track = Self {
            data: raw,
            dummy_count: 0,
        };
        track.mask_sentinels();
        Ok(track)
    }

    /// Converts remaining sentinel values to NaN and adds them to `dummy_count`.
    pub fn mask_sentinels(&mut self) -> usize {
        let mut count = 0;
        self.data.mapv_inplace(|v| {
            if is_sentinel(v) {
                count += 1;
                f64::NAN
            } else {
                v
            }
        });
        self.dummy_count += count;
        count
    }

    pub fn n_ensembles(&self) -> usize {
        self.data.nrows()
    }

    pub fn ranges(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., 0..4])
    }

    pub fn velocity(&self) -> ArrayView2<'_, f64> {
        self.data.slice(s![.., 4..8])
    }

    /// Median of the four beam ranges per ensemble.
    pub fn median_range(&self) -> Array1<f64> {
        self.ranges()
            .outer_iter()
            .map(|row| StatsHelper::nanmedian(row.iter().copied()))
            .collect()
    }

    /// Removes rows with all-zero ranges and velocities below the sanity floor.
    /// Returns the number of samples converted to NaN.
    pub fn screen(&mut self) -> usize {
        let mut removed = 0;
        for mut row in self.data.outer_iter_mut() {
            let ranges = row.slice(s![0..4]);
            let all_zero = ranges.iter().all(|&r| r == 0.0);
            if all_zero {
                removed += row.iter().filter(|v| !v.is_nan()).count();
                row.fill(f64::NAN);
                continue;
            }
            for v in row.slice_mut(s![4..8]).iter_mut() {
                if *v < BT_VELOCITY_FLOOR {
                    *v = f64::NAN;
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
            dummy_count: self.dummy_count,
        }
    }

    /// Builds a track from optional source rows; `None` rows are all NaN.
    pub fn reindex(&self, indices: &[Option<usize>]) -> Self {
        let mut data = Array2::from_elem((indices.len(), BT_CHANNELS), f64::NAN);
        for (mut row, idx) in data.outer_iter_mut().zip(indices) {
            if let Some(i) = idx {
                row.assign(&self.data.row(*i));
            }
        }
        Self {
            data,
            dummy_count: self.dummy_count,
        }
    }

    pub fn concatenate(parts: &[&BottomTrack]) -> StageResult<Self> {
        let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
        let data = ndarray::concatenate(Axis(0), &views)
            .map_err(|err| StageError::InvalidInput(format!("bottom track concat: {}", err)))?;
        Ok(Self {
            data,
            dummy_count: parts.iter().map(|p| p.dummy_count).sum(),
        })
    }

    /// An all-missing track for `n` ensembles.
    pub fn empty(n: usize) -> Self {
        Self {
            data: Array2::from_elem((n, BT_CHANNELS), f64::NAN),
            dummy_count: 0,
        }
    }
}
