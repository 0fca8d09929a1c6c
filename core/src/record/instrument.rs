use ndarray::{s, Array1, Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

use crate::math::StatsHelper;
use crate::prelude::{StageError, StageResult};
use crate::record::{is_sentinel, BottomTrack, CoordinateFrame, FixedLeader, VariableLeader};

/// Velocity component indices after rotation.
pub const EAST: usize = 0;
pub const NORTH: usize = 1;
pub const VERTICAL: usize = 2;
pub const ERROR: usize = 3;

/// Channels as they were before bin averaging, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnaveragedBackup {
    pub leader: FixedLeader,
    pub velocity: Array3<f64>,
    pub correlation: Array3<f64>,
    pub echo_amplitude: Array3<f64>,
    pub percent_good: Array3<f64>,
}

/// Everything one instrument reported for a cast.
///
/// All 3-D channels are ensemble × bin × 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentRecord {
    pub leader: FixedLeader,
    pub ensembles: Vec<VariableLeader>,
    pub velocity: Array3<f64>,
    pub correlation: Array3<f64>,
    pub echo_amplitude: Array3<f64>,
    pub percent_good: Array3<f64>,
    #[serde(default)]
    pub bottom_track: Option<BottomTrack>,
    /// Year field of the instrument real-time clock.
    pub clock_year: i32,
    /// Set once beam velocities have been rotated to Earth coordinates.
    #[serde(default)]
    pub rotated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<Box<UnaveragedBackup>>,
}

impl InstrumentRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        leader: FixedLeader,
        ensembles: Vec<VariableLeader>,
        velocity: Array3<f64>,
        correlation: Array3<f64>,
        echo_amplitude: Array3<f64>,
        percent_good: Array3<f64>,
        bottom_track: Option<BottomTrack>,
        clock_year: i32,
    ) -> StageResult<Self> {
        let record = Self {
            leader,
            ensembles,
            velocity,
            correlation,
            echo_amplitude,
            percent_good,
            bottom_track,
            clock_year,
            rotated: false,
            backup: None,
        };
        record.validate()?;
        Ok(record)
    }

    /// Checks that every channel agrees with the leader and ensemble count.
    pub fn validate(&self) -> StageResult<()> {
        let expected = vec![self.ensembles.len(), self.leader.n_bins, 4];
        for (channel, array) in [
            ("velocity", &self.velocity),
            ("correlation", &self.correlation),
            ("echo_amplitude", &self.echo_amplitude),
            ("percent_good", &self.percent_good),
        ] {
            if array.shape() != expected.as_slice() {
                return Err(StageError::ShapeMismatch {
                    channel,
                    expected,
                    found: array.shape().to_vec(),
                });
            }
        }
        if let Some(bt) = &self.bottom_track {
            if bt.n_ensembles() != self.ensembles.len() {
                return Err(StageError::ShapeMismatch {
                    channel: "bottom_track",
                    expected: vec![self.ensembles.len()],
                    found: vec![bt.n_ensembles()],
                });
            }
        }
        Ok(())
    }

    pub fn n_ensembles(&self) -> usize {
        self.ensembles.len()
    }

    pub fn n_bins(&self) -> usize {
        self.leader.n_bins
    }

    /// Frame the velocity array is currently expressed in.
    pub fn velocity_frame(&self) -> CoordinateFrame {
        if self.rotated {
            CoordinateFrame::Earth
        } else {
            self.leader.frame
        }
    }

    pub fn times(&self) -> Vec<f64> {
        self.ensembles.iter().map(|e| e.time).collect()
    }

    /// Replaces sentinels in every 3-D channel and the bottom track with NaN.
    /// Sources call this while reading.
    pub fn mask_sentinels(&mut self) -> usize {
        let mut count = 0;
        for channel in [
            &mut self.velocity,
            &mut self.correlation,
            &mut self.echo_amplitude,
            &mut self.percent_good,
        ] {
            channel.mapv_inplace(|v| {
                if is_sentinel(v) {
                    count += 1;
                    f64::NAN
                } else {
                    v
                }
            });
        }
        if let Some(bt) = self.bottom_track.as_mut() {
            count += bt.mask_sentinels();
        }
        count
    }

    /// Sets every velocity component of the listed 1-based bins to NaN.
    pub fn mask_bins(&mut self, bins: &[usize]) -> usize {
        let mut masked = 0;
        for &bin in bins {
            if bin == 0 || bin > self.n_bins() {
                continue;
            }
            let mut column = self.velocity.slice_mut(s![.., bin - 1, ..]);
            masked += column.iter().filter(|v| !v.is_nan()).count();
            column.fill(f64::NAN);
        }
        masked
    }

    /// Median of vertical velocity across bins, one value per ensemble.
    pub fn vertical_velocity_series(&self) -> Array1<f64> {
        self.velocity
            .index_axis(Axis(2), VERTICAL)
            .outer_iter()
            .map(|row| StatsHelper::nanmedian(row.iter().copied()))
            .collect()
    }

    pub fn select_ensembles(&self, indices: &[usize]) -> Self {
        Self {
            leader: self.leader.clone(),
            ensembles: indices.iter().map(|&i| self.ensembles[i]).collect(),
            velocity: self.velocity.select(Axis(0), indices),
            correlation: self.correlation.select(Axis(0), indices),
            echo_amplitude: self.echo_amplitude.select(Axis(0), indices),
            percent_good: self.percent_good.select(Axis(0), indices),
            bottom_track: self.bottom_track.as_ref().map(|bt| bt.select(indices)),
            clock_year: self.clock_year,
            rotated: self.rotated,
            backup: None,
        }
    }

    /// Builds a record with one ensemble per entry of `indices`. `None`
    /// entries become all-NaN ensembles stamped with the matching `times` value.
    pub fn reindex(&self, indices: &[Option<usize>], times: &[f64]) -> Self {
        let n_bins = self.n_bins();
        let pick = |channel: &Array3<f64>| {
            let mut out = Array3::from_elem((indices.len(), n_bins, 4), f64::NAN);
            for (mut slab, idx) in out.outer_iter_mut().zip(indices) {
                if let Some(i) = idx {
                    slab.assign(&channel.index_axis(Axis(0), *i));
                }
            }
            out
        };
        let ensembles = indices
            .iter()
            .zip(times)
            .map(|(idx, &t)| match idx {
                Some(i) => self.ensembles[*i],
                None => VariableLeader::missing(t),
            })
            .collect();
        Self {
            leader: self.leader.clone(),
            ensembles,
            velocity: pick(&self.velocity),
            correlation: pick(&self.correlation),
            echo_amplitude: pick(&self.echo_amplitude),
            percent_good: pick(&self.percent_good),
            bottom_track: self.bottom_track.as_ref().map(|bt| bt.reindex(indices)),
            clock_year: self.clock_year,
            rotated: self.rotated,
            backup: None,
        }
    }

    /// Joins records read from consecutive files of one instrument.
    pub fn concatenate(parts: Vec<InstrumentRecord>) -> StageResult<Self> {
        let mut iter = parts.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| StageError::InvalidInput("no records to concatenate".into()))?;
        let rest: Vec<InstrumentRecord> = iter.collect();
        if rest.is_empty() {
            return Ok(first);
        }
        for part in &rest {
            if part.leader.n_bins != first.leader.n_bins
                || part.leader.orientation != first.leader.orientation
            {
                return Err(StageError::InvalidInput(format!(
                    "record from instrument {} does not match bin layout of {}",
                    part.leader.serial_number, first.leader.serial_number
                )));
            }
        }

        let all: Vec<&InstrumentRecord> = std::iter::once(&first).chain(rest.iter()).collect();
        let velocity = join_channel(&all, |r| &r.velocity)?;
        let correlation = join_channel(&all, |r| &r.correlation)?;
        let echo_amplitude = join_channel(&all, |r| &r.echo_amplitude)?;
        let percent_good = join_channel(&all, |r| &r.percent_good)?;

        let bottom_track = if all.iter().all(|r| r.bottom_track.is_none()) {
            None
        } else {
            let filled: Vec<BottomTrack> = all
                .iter()
                .map(|r| {
                    r.bottom_track
                        .clone()
                        .unwrap_or_else(|| BottomTrack::empty(r.n_ensembles()))
                })
                .collect();
            let refs: Vec<&BottomTrack> = filled.iter().collect();
            Some(BottomTrack::concatenate(&refs)?)
        };

        let ensembles = all
            .iter()
            .flat_map(|r| r.ensembles.iter().copied())
            .collect();

        let mut joined = InstrumentRecord::new(
            first.leader.clone(),
            ensembles,
            velocity,
            correlation,
            echo_amplitude,
            percent_good,
            bottom_track,
            first.clock_year,
        )?;
        joined.rotated = first.rotated;
        Ok(joined)
    }
}

fn join_channel(
    records: &[&InstrumentRecord],
    get: fn(&InstrumentRecord) -> &Array3<f64>,
) -> StageResult<Array3<f64>> {
    let views: Vec<_> = records.iter().map(|r| get(r).view()).collect();
    ndarray::concatenate(Axis(0), &views)
        .map_err(|err| StageError::InvalidInput(format!("record concat: {}", err)))
}

/// Median across the four beams of a quality channel (ensemble × bin).
pub fn beam_median(channel: &Array3<f64>) -> Array2<f64> {
    let (n_ens, n_bins, _) = channel.dim();
    Array2::from_shape_fn((n_ens, n_bins), |(e, b)| {
        StatsHelper::nanmedian(channel.slice(s![e, b, ..]).iter().copied())
    })
}
