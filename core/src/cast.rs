use chrono::NaiveDate;
use log::info;
use std::sync::Arc;

use crate::prelude::{ProcessingParams, ProcessingStage, StageError, StageResult};
use crate::processing::align::SECONDS_PER_DAY;
use crate::processing::{
    BinAverageStage, LagCorrelator, ProfileMerger, QualityStage, RotationStage, TimeAligner,
};
use crate::record::{AlignmentSummary, InstrumentRecord, MergedProfile, RecordSource};
use crate::telemetry::{QcRecorder, WarningLog};

/// Clock years before this are firmware defaults, not real dates.
pub const PLAUSIBLE_YEAR_FLOOR: i32 = 1990;

/// Runs one cast from loaded records to a merged profile.
pub struct CastAssembler {
    params: ProcessingParams,
}

impl CastAssembler {
    pub fn new(params: ProcessingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ProcessingParams {
        &self.params
    }

    /// Loads both instruments, then assembles. Any load failure aborts the cast.
    pub fn assemble_from_sources(
        &self,
        down: &dyn RecordSource,
        up: Option<&dyn RecordSource>,
    ) -> StageResult<MergedProfile> {
        info!("loading down-looker from {}", down.describe());
        let down_record = down.load()?;
        let up_record = match up {
            Some(source) => {
                info!("loading up-looker from {}", source.describe());
                Some(source.load()?)
            }
            None => None,
        };
        self.assemble(down_record, up_record)
    }

    pub fn assemble(
        &self,
        down: InstrumentRecord,
        up: Option<InstrumentRecord>,
    ) -> StageResult<MergedProfile> {
        if down.leader.is_up() {
            return Err(StageError::InvalidInput(format!(
                "{}: down-looker record reports upward orientation",
                down.leader.serial_number
            )));
        }
        if let Some(up) = &up {
            if !up.leader.is_up() {
                return Err(StageError::InvalidInput(format!(
                    "{}: up-looker record reports downward orientation",
                    up.leader.serial_number
                )));
            }
        }

        let recorder = Arc::new(QcRecorder::new());
        let mut log = WarningLog::new();

        let down = self.prepare(down, &mut log)?;
        let (down, _) = self.run_stages(down, &recorder, &mut log)?;

        let (down, up, alignment) = match up {
            Some(up) => {
                let up = self.prepare(up, &mut log)?;
                let (up, _) = self.run_stages(up, &recorder, &mut log)?;
                let (down, up, summary) = self.align(down, up, &mut log)?;
                (down, Some(up), Some(summary))
            }
            None => (down, None, None),
        };

        let mut profile = ProfileMerger::from_params(&self.params).merge(&down, up.as_ref())?;

        let limit = self.params.three_beam_warning_fraction;
        let fractions = [
            ("down-looker", Some(profile.three_beam_fraction_down)),
            ("up-looker", profile.three_beam_fraction_up),
        ];
        for (name, fraction) in fractions {
            if let Some(fraction) = fraction.filter(|f| *f > limit) {
                log.warn(format!(
                    "{}: {:.0}% of samples are 3-beam solutions",
                    name,
                    fraction * 100.0
                ));
            }
        }

        profile.alignment = alignment;
        profile.qc = recorder.snapshot();
        profile.warnings = log.into_messages();
        info!(
            "assembled cast: {} ensembles x {} depth rows, {} warnings",
            profile.n_ensembles(),
            profile.n_depth(),
            profile.warnings.len()
        );
        Ok(profile)
    }

    /// Clock, pressure and time-offset corrections applied before rotation.
    fn prepare(&self, mut record: InstrumentRecord, log: &mut WarningLog) -> StageResult<InstrumentRecord> {
        let serial = record.leader.serial_number.clone();

        if record.clock_year < PLAUSIBLE_YEAR_FLOOR {
            let year = self.params.year_override.ok_or(StageError::ImplausibleYear {
                year: record.clock_year,
            })?;
            let shift = year_shift_days(record.clock_year, year)?;
            for ensemble in record.ensembles.iter_mut() {
                ensemble.time += shift;
            }
            log.warn(format!(
                "{}: clock year {} replaced by {}",
                serial, record.clock_year, year
            ));
            record.clock_year = year;
        }

        if self.params.zero_pressure {
            for ensemble in record.ensembles.iter_mut() {
                ensemble.pressure = 0.0;
                ensemble.pressure_std = 0.0;
            }
        }

        if record.leader.is_up() && self.params.up_time_offset_s != 0.0 {
            let offset = self.params.up_time_offset_s / SECONDS_PER_DAY;
            for ensemble in record.ensembles.iter_mut() {
                ensemble.time += offset;
            }
            log.record(&format!(
                "{}: clock shifted by {} s",
                serial, self.params.up_time_offset_s
            ));
        }
        Ok(record)
    }

    /// Rotation, bin averaging and quality screening for one instrument.
    /// Also returns the number of samples the chain turned into NaN.
    fn run_stages(
        &self,
        mut record: InstrumentRecord,
        recorder: &Arc<QcRecorder>,
        log: &mut WarningLog,
    ) -> StageResult<(InstrumentRecord, usize)> {
        let mut stages: Vec<Box<dyn ProcessingStage>> = vec![
            Box::new(RotationStage::new()),
            Box::new(BinAverageStage::new()),
            Box::new(QualityStage::new(Arc::clone(recorder))),
        ];
        let mut masked = 0;
        for stage in stages.iter_mut() {
            stage.initialize(&self.params)?;
            let result = stage.execute(record);
            stage.cleanup();
            let output = result?;
            masked += output.metadata.masked_samples;
            for note in &output.metadata.notes {
                log.record(note);
            }
            for warning in output.metadata.warnings {
                log.warn(warning);
            }
            record = output.record;
        }
        log.record(&format!(
            "{}: {} samples masked by rotation, averaging and screening",
            record.leader.serial_number, masked
        ));
        Ok((record, masked))
    }

    /// Puts both instruments on one ensemble index: ping check, optional
    /// resampling, then the lag-shifted overlap.
    fn align(
        &self,
        down: InstrumentRecord,
        up: InstrumentRecord,
        log: &mut WarningLog,
    ) -> StageResult<(InstrumentRecord, InstrumentRecord, AlignmentSummary)> {
        let aligner = TimeAligner::new(self.params.ping_rate_tolerance_s, self.params.resample);
        for warning in aligner.check_ping_rates(&down.times(), &up.times()) {
            log.warn(warning);
        }
        let resampled = aligner.resample(down, up);
        if resampled.unpaired > 0 {
            log.warn(format!(
                "{} ensembles had no partner within 1 s after resampling",
                resampled.unpaired
            ));
        }
        let (down, up) = (resampled.down, resampled.up);

        let down_w = down.vertical_velocity_series().to_vec();
        let up_w = up.vertical_velocity_series().to_vec();
        let lag = LagCorrelator::new(self.params.max_lag).find_lag(&down_w, &up_w);

        if lag.correlation.is_nan() {
            log.warn("no lag had enough overlapping vertical velocity; using lag 0");
        } else {
            if lag.lag.unsigned_abs() > self.params.lag_warning_threshold {
                log.warn(format!("large instrument lag of {} ensembles", lag.lag));
            }
            if lag.correlation < self.params.min_lag_correlation {
                log.warn(format!(
                    "low lag correlation {:.2} at lag {}",
                    lag.correlation, lag.lag
                ));
            }
        }

        let (down_idx, up_idx) =
            LagCorrelator::joint_indices(down.n_ensembles(), up.n_ensembles(), lag.lag);
        if down_idx.is_empty() {
            return Err(StageError::InvalidInput(format!(
                "instruments do not overlap at lag {}",
                lag.lag
            )));
        }
        info!(
            "lag {} ensembles (r = {:.3}), {} joint ensembles",
            lag.lag,
            lag.correlation,
            down_idx.len()
        );

        let summary = AlignmentSummary {
            resample: self.params.resample,
            unpaired: resampled.unpaired,
            lag: lag.lag,
            correlation: lag.correlation,
            joint_ensembles: down_idx.len(),
        };
        Ok((
            down.select_ensembles(&down_idx),
            up.select_ensembles(&up_idx),
            summary,
        ))
    }
}

/// Days between 1 January of `from` and 1 January of `to`.
fn year_shift_days(from: i32, to: i32) -> StageResult<f64> {
    let start = NaiveDate::from_ymd_opt(from, 1, 1);
    let end = NaiveDate::from_ymd_opt(to, 1, 1);
    match (start, end) {
        (Some(start), Some(end)) => Ok((end - start).num_days() as f64),
        _ => Err(StageError::InvalidInput(format!(
            "cannot shift clock from year {} to {}",
            from, to
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ResampleMode;
    use crate::record::instrument::{ERROR, VERTICAL};
    use crate::record::{BottomTrack, MemorySource, SENTINEL};
    use crate::testing::{beam_record, earth_record, noise, up_record};
    use ndarray::{s, Array2, Array3};

    fn set_vertical(record: &mut InstrumentRecord, w: &[f64]) {
        for (mut slab, &value) in record.velocity.outer_iter_mut().zip(w) {
            slab.slice_mut(s![.., VERTICAL]).fill(value);
        }
    }

    /// Down and up records whose vertical velocities agree with correlation
    /// near 0.95 when down ensemble `i` is paired with up ensemble `i + lag`.
    fn lagged_pair(n: usize, lag: usize, noise_scale: f64) -> (InstrumentRecord, InstrumentRecord) {
        let signal = noise(n, 21);
        let jitter = noise(n, 99);
        let mut down = earth_record(n, 8, 0.0);
        let mut up = up_record(n, 6, 0.0);
        let up_w: Vec<f64> = (0..n)
            .map(|j| {
                let base = if j >= lag { signal[j - lag] } else { jitter[j] };
                base + noise_scale * jitter[j]
            })
            .collect();
        set_vertical(&mut down, &signal);
        set_vertical(&mut up, &up_w);
        (down, up)
    }

    #[test]
    fn single_down_looker_keeps_every_bin() {
        let down = earth_record(10, 8, 0.1);
        let profile = CastAssembler::new(ProcessingParams::default())
            .assemble(down, None)
            .unwrap();

        assert_eq!(profile.n_depth(), 8);
        assert_eq!(profile.n_ensembles(), 10);
        assert!(profile.u.iter().all(|v| v.is_finite()));
        assert!(profile.w.iter().all(|v| v.is_finite()));
        assert!(profile.alignment.is_none());
        assert!(profile.warnings.is_empty());
    }

    #[test]
    fn two_instruments_with_known_lag_are_shifted_and_stacked() {
        let (down, up) = lagged_pair(200, 5, 0.33);
        let profile = CastAssembler::new(ProcessingParams::default())
            .assemble(down, Some(up))
            .unwrap();

        let alignment = profile.alignment.clone().unwrap();
        assert_eq!(alignment.lag, 5);
        assert!(alignment.correlation >= 0.9);
        assert_eq!(alignment.joint_ensembles, 195);
        assert_eq!(profile.n_ensembles(), 195);
        assert_eq!(profile.n_depth(), 6 + 8);
        assert_eq!(profile.depth_offset[0], -(6.0 + 5.0 * 2.0));
        assert_eq!(profile.depth_offset[6], 6.0);
        assert!(profile.warnings.is_empty(), "{:?}", profile.warnings);
    }

    #[test]
    fn uncorrelated_instruments_raise_a_warning() {
        let mut down = earth_record(100, 4, 0.0);
        let mut up = up_record(100, 4, 0.0);
        set_vertical(&mut down, &noise(100, 1));
        set_vertical(&mut up, &noise(100, 2));
        let profile = CastAssembler::new(ProcessingParams::default())
            .assemble(down, Some(up))
            .unwrap();
        assert!(profile.warnings.iter().any(|w| w.contains("low lag correlation")));
    }

    #[test]
    fn bottom_track_dummies_become_nan() {
        let mut down = earth_record(50, 4, 0.0);
        let mut raw = Array2::from_elem((50, 8), 0.05);
        raw.slice_mut(s![.., 0..4]).fill(30.0);
        raw.slice_mut(s![0..5, 4..8]).fill(SENTINEL);
        down.bottom_track = Some(BottomTrack::from_raw(raw).unwrap());

        let source = MemorySource::new("down", down);
        let profile = CastAssembler::new(ProcessingParams::default())
            .assemble_from_sources(&source, None)
            .unwrap();

        let velocity = &profile.bottom_track.velocity;
        assert_eq!(velocity.iter().filter(|v| v.is_nan()).count(), 20);
        assert!(velocity
            .iter()
            .filter(|v| !v.is_nan())
            .all(|&v| v == 0.05));
        assert_eq!(profile.qc.bottom_track_dummies, 20);
        assert!(profile.bottom_track.range.iter().all(|&r| r == 30.0));
    }

    #[test]
    fn percent_good_at_the_limit_is_kept() {
        let mut down = earth_record(4, 5, 0.1);
        down.percent_good.fill(50.0);
        let profile = CastAssembler::new(ProcessingParams::default())
            .assemble(down, None)
            .unwrap();
        assert!(profile.u.iter().all(|v| v.is_finite()));
        assert_eq!(profile.qc.percent_good, 0);
    }

    #[test]
    fn beam_frame_record_is_rotated_before_screening() {
        let down = beam_record(3, 4, Array3::from_elem((3, 4, 4), 0.1));
        let profile = CastAssembler::new(ProcessingParams::default())
            .assemble(down, None)
            .unwrap();
        let expected_w = 0.1 / 20f64.to_radians().cos();
        assert!(profile.u.iter().all(|v| v.abs() < 1e-12));
        assert!(profile.w.iter().all(|v| (v - expected_w).abs() < 1e-12));
    }

    #[test]
    fn implausible_year_needs_an_override() {
        let mut down = earth_record(3, 2, 0.0);
        down.clock_year = 1970;
        let err = CastAssembler::new(ProcessingParams::default()).assemble(down.clone(), None);
        assert!(matches!(err, Err(StageError::ImplausibleYear { year: 1970 })));

        let params = ProcessingParams {
            year_override: Some(2021),
            ..ProcessingParams::default()
        };
        let profile = CastAssembler::new(params).assemble(down, None).unwrap();
        assert!((profile.time[0] - (100.0 + 18_628.0)).abs() < 1e-9);
        assert!(profile.warnings[0].contains("clock year 1970"));
    }

    #[test]
    fn preparation_zeroes_pressure_and_shifts_the_up_clock() {
        let params = ProcessingParams {
            zero_pressure: true,
            up_time_offset_s: 2.0,
            ..ProcessingParams::default()
        };
        let assembler = CastAssembler::new(params);
        let mut log = WarningLog::new();

        let mut up = up_record(2, 3, 0.0);
        up.ensembles[0].pressure = 120.0;
        let t0 = up.ensembles[0].time;
        let up = assembler.prepare(up, &mut log).unwrap();
        assert_eq!(up.ensembles[0].pressure, 0.0);
        assert!((up.ensembles[0].time - t0 - 2.0 / SECONDS_PER_DAY).abs() < 1e-12);

        let down = assembler.prepare(earth_record(2, 3, 0.0), &mut log).unwrap();
        assert_eq!(down.ensembles[0].time, t0);
        assert!(log.is_empty());
    }

    #[test]
    fn resampling_pairs_a_slower_up_looker() {
        let (down, mut up) = lagged_pair(60, 0, 0.0);
        for (i, e) in up.ensembles.iter_mut().enumerate() {
            e.time += 0.2 * (i % 2) as f64 / SECONDS_PER_DAY;
        }
        let params = ProcessingParams {
            resample: ResampleMode::UpToDown,
            ..ProcessingParams::default()
        };
        let profile = CastAssembler::new(params).assemble(down, Some(up)).unwrap();
        let alignment = profile.alignment.unwrap();
        assert_eq!(alignment.resample, ResampleMode::UpToDown);
        assert_eq!(alignment.unpaired, 0);
        assert_eq!(alignment.lag, 0);
        assert!(profile.warnings.iter().any(|w| w.starts_with("up-looker ping interval")));
    }

    #[test]
    fn resampling_down_onto_up_counts_unpaired_down_ensembles() {
        let (down, mut up) = lagged_pair(60, 0, 0.0);
        let late = down.ensembles[59].time + 5.0 / SECONDS_PER_DAY;
        up.ensembles[59].time = late;
        let params = ProcessingParams {
            resample: ResampleMode::DownToUp,
            ..ProcessingParams::default()
        };
        let profile = CastAssembler::new(params).assemble(down, Some(up)).unwrap();
        let alignment = profile.alignment.clone().unwrap();
        assert_eq!(alignment.resample, ResampleMode::DownToUp);
        assert_eq!(alignment.unpaired, 1);
        assert_eq!(alignment.lag, 0);
        assert_eq!(profile.n_ensembles(), 60);
        assert_eq!(profile.time[59], late);
        assert!(profile.u.slice(s![6.., 59]).iter().all(|v| v.is_nan()));
        assert!(profile.u.slice(s![..6, 59]).iter().all(|v| v.is_finite()));
        assert!(profile
            .warnings
            .iter()
            .any(|w| w.starts_with("1 ensembles had no partner")));
    }

    #[test]
    fn stage_chain_reports_masked_samples() {
        let mut down = earth_record(4, 5, 0.1);
        down.velocity.slice_mut(s![2, .., ERROR]).fill(0.9);
        let params = ProcessingParams {
            down_bin_mask: vec![1],
            ..ProcessingParams::default()
        };
        let assembler = CastAssembler::new(params);
        let recorder = Arc::new(QcRecorder::new());
        let mut log = WarningLog::new();
        let (record, masked) = assembler.run_stages(down, &recorder, &mut log).unwrap();
        let snapshot = recorder.snapshot();
        assert_eq!(masked, 16 + 12);
        assert_eq!(masked, snapshot.bin_masked + snapshot.error_velocity);
        assert_eq!(record.velocity.iter().filter(|v| v.is_nan()).count(), masked);
    }

    #[test]
    fn swapped_orientation_is_rejected() {
        let up = up_record(3, 2, 0.0);
        let assembler = CastAssembler::new(ProcessingParams::default());
        assert!(matches!(
            assembler.assemble(up, None),
            Err(StageError::InvalidInput(_))
        ));
    }

    #[test]
    fn bin_masks_and_quality_counts_reach_the_profile() {
        let mut down = earth_record(4, 5, 0.1);
        down.velocity.slice_mut(s![2, .., ERROR]).fill(0.9);
        let params = ProcessingParams {
            down_bin_mask: vec![1],
            ..ProcessingParams::default()
        };
        let profile = CastAssembler::new(params).assemble(down, None).unwrap();
        assert!(profile.u.row(0).iter().all(|v| v.is_nan()));
        assert_eq!(profile.qc.bin_masked, 16);
        assert_eq!(profile.qc.error_velocity, 12);
        assert!(profile.u[[1, 2]].is_nan());
        assert_eq!(profile.u[[1, 1]], 0.1);
    }
}
