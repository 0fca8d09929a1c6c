use ndarray::{s, Array1, Array2, ArrayView2, Axis};

use crate::params::ProcessingParams;
use crate::prelude::{StageError, StageResult};
use crate::processing::diagnostics::Diagnostics;
use crate::processing::surface::SurfaceStrategy;
use crate::record::instrument::{EAST, ERROR, NORTH, VERTICAL};
use crate::record::{
    beam_median, BottomTrackSeries, FixedLeader, InstrumentRecord, InstrumentSeries,
    MergedProfile, RetainedEcho,
};
use crate::telemetry::QcSummary;

/// Stacks aligned down- and up-looker records into one depth-ordered profile.
#[derive(Debug, Clone)]
pub struct ProfileMerger {
    mount_offset: f64,
    retained_beams: Vec<usize>,
    ping_error_bins: usize,
    surface_min_excess: f64,
}

impl ProfileMerger {
    pub fn from_params(params: &ProcessingParams) -> Self {
        Self {
            mount_offset: params.mount_offset,
            retained_beams: params.retained_beams.clone(),
            ping_error_bins: params.ping_error_bins,
            surface_min_excess: params.surface_min_excess,
        }
    }

    /// Offsets of each merged row from the down-looking transducer (m),
    /// strictly increasing.
    pub fn depth_axis(down: &FixedLeader, up: Option<&FixedLeader>, mount_offset: f64) -> Array1<f64> {
        let mut depth = Vec::with_capacity(down.n_bins + up.map_or(0, |u| u.n_bins));
        if let Some(up) = up {
            depth.extend((0..up.n_bins).rev().map(|k| -(mount_offset + up.bin_distance(k))));
        }
        depth.extend(down.bin_distances());
        Array1::from(depth)
    }

    /// Depth × ensemble matrix: up-looker bins reversed on top, down-looker below.
    pub fn stack(down: ArrayView2<f64>, up: Option<ArrayView2<f64>>) -> Array2<f64> {
        let n_ens = down.nrows();
        let up_bins = up.map_or(0, |u| u.ncols());
        let mut out = Array2::from_elem((up_bins + down.ncols(), n_ens), f64::NAN);
        if let Some(up) = up {
            out.slice_mut(s![..up_bins, ..])
                .assign(&up.slice(s![.., ..;-1]).t());
        }
        out.slice_mut(s![up_bins.., ..]).assign(&down.t());
        out
    }

    /// Builds the merged profile. Both records must already share one
    /// ensemble index; alignment, QC totals and warnings are left empty.
    pub fn merge(&self, down: &InstrumentRecord, up: Option<&InstrumentRecord>) -> StageResult<MergedProfile> {
        if let Some(up) = up {
            if up.n_ensembles() != down.n_ensembles() {
                return Err(StageError::ShapeMismatch {
                    channel: "up-looker ensembles",
                    expected: vec![down.n_ensembles()],
                    found: vec![up.n_ensembles()],
                });
            }
        }

        let component = |comp: usize| {
            Self::stack(
                down.velocity.index_axis(Axis(2), comp),
                up.map(|u| u.velocity.index_axis(Axis(2), comp)),
            )
        };
        let down_ts = beam_median(&down.echo_amplitude);
        let up_ts = up.map(|u| beam_median(&u.echo_amplitude));
        let target_strength = Self::stack(down_ts.view(), up_ts.as_ref().map(|a| a.view()));
        let down_corr = beam_median(&down.correlation);
        let up_corr = up.map(|u| beam_median(&u.correlation));
        let correlation = Self::stack(down_corr.view(), up_corr.as_ref().map(|a| a.view()));
        let weight = Diagnostics::weight(&correlation);

        let retained_echo = self
            .retained_beams
            .iter()
            .filter(|&&beam| (1..=4).contains(&beam))
            .map(|&beam| RetainedEcho {
                beam,
                values: Self::stack(
                    down.echo_amplitude.index_axis(Axis(2), beam - 1),
                    up.map(|u| u.echo_amplitude.index_axis(Axis(2), beam - 1)),
                ),
            })
            .collect();

        let bottom_track = match &down.bottom_track {
            Some(bt) => BottomTrackSeries {
                range: bt.median_range(),
                velocity: bt.velocity().to_owned(),
            },
            None => BottomTrackSeries {
                range: Array1::from_elem(down.n_ensembles(), f64::NAN),
                velocity: Array2::from_elem((down.n_ensembles(), 4), f64::NAN),
            },
        };

        let surface = up.map(|u| SurfaceStrategy::select(u, self.surface_min_excess).detect(u));

        let down_series = InstrumentSeries::from_record(down);
        let tilt = Diagnostics::tilt(&down_series.pitch, &down_series.roll);
        let tilt_rate = Diagnostics::tilt_rate(&tilt);
        let three_beam = |record: &InstrumentRecord| {
            Diagnostics::three_beam_fraction(
                record.velocity.index_axis(Axis(2), VERTICAL),
                record.velocity.index_axis(Axis(2), ERROR),
            )
        };

        Ok(MergedProfile {
            time: down_series.time.clone(),
            depth_offset: Self::depth_axis(&down.leader, up.map(|u| &u.leader), self.mount_offset),
            up_bins: up.map_or(0, |u| u.n_bins()),
            down_bins: down.n_bins(),
            u: component(EAST),
            v: component(NORTH),
            w: component(VERTICAL),
            error: component(ERROR),
            target_strength,
            correlation,
            weight,
            retained_echo,
            up: up.map(InstrumentSeries::from_record),
            bottom_track,
            surface,
            tilt,
            tilt_rate,
            single_ping_error: Diagnostics::single_ping_error(down, self.ping_error_bins),
            three_beam_fraction_down: three_beam(down),
            three_beam_fraction_up: up.map(three_beam),
            down: down_series,
            alignment: None,
            qc: QcSummary::default(),
            warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{earth_record, up_record};

    #[test]
    fn depth_axis_runs_from_far_up_bin_to_far_down_bin() {
        let down = earth_record(1, 3, 0.0);
        let up = up_record(1, 2, 0.0);
        let depth = ProfileMerger::depth_axis(&down.leader, Some(&up.leader), 1.0);
        assert_eq!(depth.to_vec(), vec![-9.0, -7.0, 6.0, 8.0, 10.0]);
        assert!(depth.to_vec().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn up_bins_are_reversed_above_down_bins() {
        let mut down = earth_record(2, 3, 0.0);
        let mut up = up_record(2, 2, 0.0);
        for b in 0..3 {
            down.velocity[[1, b, EAST]] = 10.0 + b as f64;
        }
        for b in 0..2 {
            up.velocity[[1, b, EAST]] = 20.0 + b as f64;
        }
        let merger = ProfileMerger::from_params(&ProcessingParams::default());
        let profile = merger.merge(&down, Some(&up)).unwrap();

        assert_eq!(profile.u.dim(), (5, 2));
        assert_eq!(profile.u.column(1).to_vec(), vec![21.0, 20.0, 10.0, 11.0, 12.0]);
        assert_eq!((profile.up_bins, profile.down_bins), (2, 3));
        assert!(profile.surface.is_some());
        assert!(profile.up.is_some());
    }

    #[test]
    fn down_only_profile_has_no_up_rows() {
        let down = earth_record(4, 3, 0.1);
        let merger = ProfileMerger::from_params(&ProcessingParams::default());
        let profile = merger.merge(&down, None).unwrap();

        assert_eq!(profile.n_depth(), 3);
        assert_eq!(profile.n_ensembles(), 4);
        assert_eq!(profile.w[[0, 0]], 0.1);
        assert!(profile.surface.is_none());
        assert!(profile.three_beam_fraction_up.is_none());
        assert_eq!(profile.three_beam_fraction_down, 0.0);
        assert!(profile.bottom_track.range.iter().all(|r| r.is_nan()));
        assert!(profile.weight.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn retained_beams_keep_raw_echo() {
        let mut down = earth_record(1, 2, 0.0);
        down.echo_amplitude[[0, 1, 2]] = 99.0;
        let params = ProcessingParams {
            retained_beams: vec![3, 9],
            ..ProcessingParams::default()
        };
        let profile = ProfileMerger::from_params(&params).merge(&down, None).unwrap();
        assert_eq!(profile.retained_echo.len(), 1);
        assert_eq!(profile.retained_echo[0].beam, 3);
        assert_eq!(profile.retained_echo[0].values[[1, 0]], 99.0);
    }

    #[test]
    fn mismatched_ensemble_counts_are_rejected() {
        let down = earth_record(4, 3, 0.0);
        let up = up_record(3, 3, 0.0);
        let merger = ProfileMerger::from_params(&ProcessingParams::default());
        assert!(matches!(
            merger.merge(&down, Some(&up)),
            Err(StageError::ShapeMismatch { .. })
        ));
    }
}
