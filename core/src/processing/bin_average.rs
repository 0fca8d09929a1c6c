use ndarray::{s, Array3, Axis};

use crate::math::StatsHelper;
use crate::prelude::{
    ProcessingParams, ProcessingStage, StageError, StageMetadata, StageOutput, StageResult,
};
use crate::record::{FixedLeader, InstrumentRecord, UnaveragedBackup};
use crate::telemetry::WarningLog;

/// Bins reported when the averaging factor swallows the whole profile.
pub const COLLAPSED_BINS: usize = 3;

/// Pre-averaging of high-resolution instruments.
#[derive(Debug, Clone, Copy)]
pub struct BinAverager {
    factor: usize,
    min_range_blank: f64,
}

impl BinAverager {
    pub fn new(factor: usize, min_range_blank: f64) -> Self {
        Self {
            factor: factor.max(1),
            min_range_blank,
        }
    }

    pub fn from_params(params: &ProcessingParams) -> Self {
        Self::new(params.bin_average_factor, params.min_range_blank)
    }

    /// Averaging only runs for high-frequency instruments with a factor above one.
    pub fn applies_to(leader: &FixedLeader, params: &ProcessingParams) -> bool {
        params.bin_average_factor > 1 && leader.frequency_khz >= params.high_frequency_khz
    }

    /// Blanks near-transducer velocity while the package moves into its own wake:
    /// rising for a down-looker, sinking for an up-looker.
    pub fn blank_near_field(&self, record: &mut InstrumentRecord) -> usize {
        if self.min_range_blank <= 0.0 {
            return 0;
        }
        let near_bins = (0..record.n_bins())
            .take_while(|&k| record.leader.bin_distance(k) < self.min_range_blank)
            .count();
        if near_bins == 0 {
            return 0;
        }

        let up = record.leader.is_up();
        let w_series = record.vertical_velocity_series();
        let mut blanked = 0;
        for (mut slab, w) in record.velocity.outer_iter_mut().zip(w_series.iter()) {
            // water appears to sink when the package rises
            let in_wake = if up { *w > 0.0 } else { *w < 0.0 };
            if !in_wake {
                continue;
            }
            let mut near = slab.slice_mut(s![..near_bins, ..]);
            blanked += near.iter().filter(|v| !v.is_nan()).count();
            near.fill(f64::NAN);
        }
        blanked
    }

    /// NaN-mean over consecutive groups of `factor` bins.
    pub fn average_channel(&self, channel: &Array3<f64>) -> Array3<f64> {
        let (n_ens, n_bins, n_comp) = channel.dim();
        if self.factor > n_bins {
            let mut out = Array3::from_elem((n_ens, COLLAPSED_BINS, n_comp), f64::NAN);
            for e in 0..n_ens {
                for c in 0..n_comp {
                    let mean = StatsHelper::nanmean(channel.slice(s![e, .., c]).iter().copied());
                    out.slice_mut(s![e, .., c]).fill(mean);
                }
            }
            return out;
        }

        let n_out = averaged_bin_count(n_bins, self.factor);
        let mut out = Array3::from_elem((n_ens, n_out, n_comp), f64::NAN);
        for (group, chunk) in channel.axis_chunks_iter(Axis(1), self.factor).enumerate() {
            for e in 0..n_ens {
                for c in 0..n_comp {
                    out[[e, group, c]] =
                        StatsHelper::nanmean(chunk.slice(s![e, .., c]).iter().copied());
                }
            }
        }
        out
    }

    /// Bin geometry after averaging.
    ///
    /// Collapsed bins split the measured range into [`COLLAPSED_BINS`] equal
    /// cells, so their depths stay inside the original profile.
    pub fn averaged_leader(&self, leader: &FixedLeader) -> FixedLeader {
        let mut averaged = leader.clone();
        if self.factor > leader.n_bins {
            let span = leader.n_bins as f64 * leader.bin_length;
            let cell = span / COLLAPSED_BINS as f64;
            averaged.first_bin_distance += 0.5 * (cell - leader.bin_length);
            averaged.bin_length = cell;
            averaged.n_bins = COLLAPSED_BINS;
        } else {
            averaged.first_bin_distance += 0.5 * (self.factor - 1) as f64 * leader.bin_length;
            averaged.bin_length *= self.factor as f64;
            averaged.n_bins = averaged_bin_count(leader.n_bins, self.factor);
        }
        averaged
    }

    pub fn apply(&self, mut record: InstrumentRecord) -> (InstrumentRecord, usize) {
        record.backup = Some(Box::new(UnaveragedBackup {
            leader: record.leader.clone(),
            velocity: record.velocity.clone(),
            correlation: record.correlation.clone(),
            echo_amplitude: record.echo_amplitude.clone(),
            percent_good: record.percent_good.clone(),
        }));
        let blanked = self.blank_near_field(&mut record);

        record.velocity = self.average_channel(&record.velocity);
        record.correlation = self.average_channel(&record.correlation);
        record.echo_amplitude = self.average_channel(&record.echo_amplitude);
        record.percent_good = self.average_channel(&record.percent_good);
        record.leader = self.averaged_leader(&record.leader);
        (record, blanked)
    }
}

pub fn averaged_bin_count(n_bins: usize, factor: usize) -> usize {
    (n_bins + factor - 1) / factor
}

pub struct BinAverageStage {
    averager: Option<BinAverager>,
    params: Option<ProcessingParams>,
    logger: WarningLog,
}

impl BinAverageStage {
    pub fn new() -> Self {
        Self {
            averager: None,
            params: None,
            logger: WarningLog::new(),
        }
    }
}

impl Default for BinAverageStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for BinAverageStage {
    fn initialize(&mut self, params: &ProcessingParams) -> StageResult<()> {
        self.averager = Some(BinAverager::from_params(params));
        self.params = Some(params.clone());
        Ok(())
    }

    fn execute(&mut self, record: InstrumentRecord) -> StageResult<StageOutput> {
        let (averager, params) = match (&self.averager, &self.params) {
            (Some(averager), Some(params)) => (averager, params),
            _ => return Err(StageError::Internal("bin average stage not initialized".into())),
        };

        if !BinAverager::applies_to(&record.leader, params) {
            return Ok(StageOutput {
                record,
                metadata: StageMetadata::default(),
            });
        }

        let original_bins = record.n_bins();
        let (record, blanked) = averager.apply(record);
        let note = format!(
            "{}: averaged {} bins by {} into {} bins of {:.2} m",
            record.leader.serial_number,
            original_bins,
            params.bin_average_factor,
            record.n_bins(),
            record.leader.bin_length
        );
        self.logger.record(&note);
        Ok(StageOutput {
            record,
            metadata: StageMetadata {
                masked_samples: blanked,
                notes: vec![note],
                ..Default::default()
            },
        })
    }

    fn cleanup(&mut self) {
        self.averager = None;
        self.params = None;
    }
}
