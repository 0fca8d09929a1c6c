use ndarray::{s, Array2, Axis};
use std::sync::Arc;

use crate::prelude::{
    ProcessingParams, ProcessingStage, StageError, StageMetadata, StageOutput, StageResult,
};
use crate::record::instrument::{ERROR, VERTICAL};
use crate::record::{beam_median, CoordinateFrame, InstrumentFamily, InstrumentRecord};
use crate::telemetry::{QcReason, QcRecorder, WarningLog};

/// Percent-good channel holding four-beam solutions in Earth-frame data.
const FOUR_BEAM_SOLUTIONS: usize = 3;

/// Threshold screening of one instrument's Earth-frame velocities.
#[derive(Debug, Clone, Copy)]
pub struct QualityFilter {
    percent_good_limit: f64,
    error_velocity_limit: f64,
}

impl QualityFilter {
    pub fn new(percent_good_limit: f64, error_velocity_limit: f64) -> Self {
        Self {
            percent_good_limit,
            error_velocity_limit,
        }
    }

    pub fn from_params(params: &ProcessingParams) -> Self {
        Self::new(params.percent_good_limit, params.error_velocity_limit)
    }

    /// Per-bin percent-good: four-beam solutions for data recorded in Earth
    /// coordinates, the beam median for data recorded in beam coordinates.
    pub fn percent_good_scalar(record: &InstrumentRecord) -> Array2<f64> {
        match record.leader.frame {
            CoordinateFrame::Earth => record
                .percent_good
                .index_axis(Axis(2), FOUR_BEAM_SOLUTIONS)
                .to_owned(),
            CoordinateFrame::Beam => beam_median(&record.percent_good),
        }
    }

    /// Bins below the percent-good limit lose all four components.
    pub fn apply_percent_good(&self, record: &mut InstrumentRecord) -> usize {
        let pg = Self::percent_good_scalar(record);
        let mut masked = 0;
        for ((e, b), &value) in pg.indexed_iter() {
            if value < self.percent_good_limit {
                let mut sample = record.velocity.slice_mut(s![e, b, ..]);
                masked += sample.iter().filter(|v| !v.is_nan()).count();
                sample.fill(f64::NAN);
            }
        }
        masked
    }

    /// Samples with |error velocity| above the limit lose east/north/vertical.
    pub fn apply_error_velocity(&self, record: &mut InstrumentRecord) -> usize {
        let mut masked = 0;
        for mut sample in record.velocity.lanes_mut(Axis(2)) {
            if sample[ERROR].abs() > self.error_velocity_limit {
                for comp in 0..=VERTICAL {
                    if !sample[comp].is_nan() {
                        masked += 1;
                    }
                    sample[comp] = f64::NAN;
                }
            }
        }
        masked
    }

    /// Replaces ensembles whose velocities are all exactly zero with NaN.
    ///
    /// Broadband firmware writes such ensembles when a ping fails; the product
    /// and the sum of the values are then both zero.
    pub fn screen_zero_ensembles(record: &mut InstrumentRecord) -> usize {
        if record.leader.family != InstrumentFamily::Broadband {
            return 0;
        }
        let mut screened = 0;
        for mut slab in record.velocity.outer_iter_mut() {
            let mut finite = slab.iter().filter(|v| v.is_finite()).peekable();
            if finite.peek().is_none() {
                continue;
            }
            if finite.all(|&v| v == 0.0) {
                slab.fill(f64::NAN);
                screened += 1;
            }
        }
        screened
    }
}

/// Stage that applies bin masks, threshold filters and garbage screening.
pub struct QualityStage {
    filter: Option<QualityFilter>,
    params: Option<ProcessingParams>,
    recorder: Arc<QcRecorder>,
    logger: WarningLog,
}

impl QualityStage {
    pub fn new(recorder: Arc<QcRecorder>) -> Self {
        Self {
            filter: None,
            params: None,
            recorder,
            logger: WarningLog::new(),
        }
    }
}

impl ProcessingStage for QualityStage {
    fn initialize(&mut self, params: &ProcessingParams) -> StageResult<()> {
        if params.percent_good_limit < 0.0 || params.error_velocity_limit <= 0.0 {
            return Err(StageError::InvalidInput(
                "quality limits must be positive".into(),
            ));
        }
        self.filter = Some(QualityFilter::from_params(params));
        self.params = Some(params.clone());
        Ok(())
    }

    fn execute(&mut self, mut record: InstrumentRecord) -> StageResult<StageOutput> {
        let (filter, params) = match (&self.filter, &self.params) {
            (Some(filter), Some(params)) => (*filter, params),
            _ => return Err(StageError::Internal("quality stage not initialized".into())),
        };
        if record.velocity_frame() != CoordinateFrame::Earth {
            return Err(StageError::InvalidInput(format!(
                "{}: quality screening needs Earth-frame velocity",
                record.leader.serial_number
            )));
        }

        let serial = record.leader.serial_number.clone();
        let mut warnings = Vec::new();

        let mask = if record.leader.is_up() {
            &params.up_bin_mask
        } else {
            &params.down_bin_mask
        };
        if record.leader.blank_distance == 0.0 && mask.is_empty() {
            warnings.push(format!(
                "{}: zero blank after transmit and no bin mask; first bin may be contaminated",
                serial
            ));
        }
        let bin_masked = record.mask_bins(mask);
        self.recorder.record(QcReason::BinMask, bin_masked);

        let zero_ensembles = QualityFilter::screen_zero_ensembles(&mut record);
        if zero_ensembles > 0 {
            warnings.push(format!(
                "{}: {} all-zero ensembles replaced with NaN",
                serial, zero_ensembles
            ));
        }
        self.recorder.record(QcReason::ZeroEnsemble, zero_ensembles);

        let pg_masked = filter.apply_percent_good(&mut record);
        self.recorder.record(QcReason::PercentGood, pg_masked);
        let ev_masked = filter.apply_error_velocity(&mut record);
        self.recorder.record(QcReason::ErrorVelocity, ev_masked);

        if let Some(bt) = record.bottom_track.as_mut() {
            let screened = bt.screen();
            self.recorder
                .record(QcReason::BottomTrackDummy, bt.dummy_count);
            self.recorder.record(QcReason::BottomTrackScreen, screened);
            if bt.dummy_count + screened > 0 {
                warnings.push(format!(
                    "{}: {} bottom-track dummies and {} implausible values replaced with NaN",
                    serial, bt.dummy_count, screened
                ));
            }
        }

        let note = format!(
            "{}: percent-good removed {} samples, error velocity removed {}",
            serial, pg_masked, ev_masked
        );
        self.logger.record(&note);
        Ok(StageOutput {
            record,
            metadata: StageMetadata {
                masked_samples: bin_masked + pg_masked + ev_masked,
                notes: vec![note],
                warnings,
            },
        })
    }

    fn cleanup(&mut self) {
        self.filter = None;
        self.params = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::instrument::{EAST, NORTH};
    use crate::record::{BottomTrack, SENTINEL};
    use crate::testing::earth_record;

    #[test]
    fn error_velocity_above_limit_removes_horizontal_and_vertical() {
        let mut record = earth_record(1, 3, 0.1);
        record.velocity[[0, 0, ERROR]] = 0.6;
        record.velocity[[0, 1, ERROR]] = -0.5;
        record.velocity[[0, 2, ERROR]] = 0.2;

        let masked = QualityFilter::new(50.0, 0.5).apply_error_velocity(&mut record);
        assert_eq!(masked, 3);
        for comp in [EAST, NORTH, VERTICAL] {
            assert!(record.velocity[[0, 0, comp]].is_nan());
            assert!(record.velocity[[0, 1, comp]].is_finite());
            assert!(record.velocity[[0, 2, comp]].is_finite());
        }
        assert_eq!(record.velocity[[0, 0, ERROR]], 0.6);
    }

    #[test]
    fn percent_good_below_limit_removes_all_components() {
        let mut record = earth_record(1, 3, 0.1);
        record.percent_good[[0, 0, FOUR_BEAM_SOLUTIONS]] = 49.9;
        record.percent_good[[0, 1, FOUR_BEAM_SOLUTIONS]] = 50.0;

        let masked = QualityFilter::new(50.0, 0.5).apply_percent_good(&mut record);
        assert_eq!(masked, 4);
        assert!(record.velocity.slice(s![0, 0, ..]).iter().all(|v| v.is_nan()));
        assert!(record.velocity.slice(s![0, 1, ..]).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn beam_frame_percent_good_uses_beam_median() {
        let mut record = earth_record(1, 1, 0.1);
        record.leader.frame = CoordinateFrame::Beam;
        record.percent_good[[0, 0, 0]] = 0.0;
        record.percent_good[[0, 0, 1]] = 10.0;
        record.percent_good[[0, 0, 2]] = 90.0;
        record.percent_good[[0, 0, 3]] = 100.0;
        assert_eq!(QualityFilter::percent_good_scalar(&record)[[0, 0]], 50.0);
    }

    #[test]
    fn zero_ensembles_screened_for_broadband_only() {
        let mut record = earth_record(2, 3, 0.1);
        record.velocity.index_axis_mut(Axis(0), 1).fill(0.0);
        record.velocity[[1, 2, EAST]] = f64::NAN;
        let mut workhorse = record.clone();

        record.leader.family = InstrumentFamily::Broadband;
        assert_eq!(QualityFilter::screen_zero_ensembles(&mut record), 1);
        assert!(record.velocity.index_axis(Axis(0), 1).iter().all(|v| v.is_nan()));
        assert!(record.velocity[[0, 0, EAST]].is_finite());

        assert_eq!(QualityFilter::screen_zero_ensembles(&mut workhorse), 0);
    }

    #[test]
    fn stage_reports_masks_and_bottom_track_dummies() {
        let mut record = earth_record(2, 4, 0.1);
        record.leader.blank_distance = 0.0;
        let mut raw = Array2::from_elem((2, 8), 0.05);
        raw.slice_mut(s![.., 0..4]).fill(30.0);
        raw[[1, 4]] = SENTINEL;
        record.bottom_track = Some(BottomTrack::from_raw(raw).unwrap());

        let recorder = Arc::new(QcRecorder::new());
        let mut stage = QualityStage::new(recorder.clone());
        stage.initialize(&ProcessingParams::default()).unwrap();
        let out = stage.execute(record).unwrap();

        assert_eq!(out.metadata.warnings.len(), 2);
        assert!(out.metadata.warnings[0].contains("zero blank"));
        let qc = recorder.snapshot();
        assert_eq!(qc.bottom_track_dummies, 1);
        assert_eq!(qc.percent_good, 0);
        stage.cleanup();
    }

    #[test]
    fn stage_rejects_unrotated_beam_data() {
        let mut record = earth_record(1, 2, 0.0);
        record.leader.frame = CoordinateFrame::Beam;
        let mut stage = QualityStage::new(Arc::new(QcRecorder::new()));
        stage.initialize(&ProcessingParams::default()).unwrap();
        assert!(matches!(
            stage.execute(record),
            Err(StageError::InvalidInput(_))
        ));
    }
}
