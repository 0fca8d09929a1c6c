use ndarray::{arr1, Array3, ArrayView1, ArrayView2, ArrayViewMut2, Zip};

use crate::math::matrix::MatrixHelper;
use crate::prelude::{
    ProcessingParams, ProcessingStage, StageError, StageMetadata, StageOutput, StageResult,
};
use crate::record::{CoordinateFrame, FixedLeader, InstrumentRecord, VariableLeader};
use crate::telemetry::WarningLog;

/// Beam-to-Earth transformation for one instrument.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateRotator {
    beam_angle: f64,
    convex: bool,
    up: bool,
    bin_mapping: bool,
}

impl CoordinateRotator {
    pub fn new(beam_angle: f64, convex: bool, up: bool, bin_mapping: bool) -> Self {
        Self {
            beam_angle,
            convex,
            up,
            bin_mapping,
        }
    }

    pub fn from_leader(leader: &FixedLeader) -> Self {
        Self::new(
            leader.beam_angle,
            leader.convex,
            leader.is_up(),
            leader.bin_mapping,
        )
    }

    /// Rotates an ensemble × bin × beam field into east/north/vertical/error.
    ///
    /// Ensembles are processed in parallel; each depends only on its own
    /// beams and attitude.
    pub fn rotate(&self, beams: &Array3<f64>, ensembles: &[VariableLeader]) -> Array3<f64> {
        let mut earth = Array3::from_elem(beams.raw_dim(), f64::NAN);
        let attitude = ArrayView1::from(ensembles);
        Zip::from(earth.outer_iter_mut())
            .and(beams.outer_iter())
            .and(attitude)
            .par_for_each(|out, ens_beams, ens| self.rotate_ensemble(ens_beams, ens, out));
        earth
    }

    fn rotate_ensemble(
        &self,
        beams: ArrayView2<f64>,
        ens: &VariableLeader,
        mut out: ArrayViewMut2<f64>,
    ) {
        // fixed tilt sensor: pitch reads against the rolled frame
        let pitch = (ens.pitch.to_radians().tan() * ens.roll.to_radians().cos())
            .atan()
            .to_degrees();
        let m = MatrixHelper::attitude_matrix(ens.heading, pitch, ens.roll);
        if m.iter().any(|v| !v.is_finite()) {
            return;
        }

        // An up-looker is the down-looker rolled by 180 degrees: x and z flip.
        let (sx, sz) = if self.up { (-1.0, -1.0) } else { (1.0, 1.0) };
        let (sin_b, cos_b) = self.beam_angle.to_radians().sin_cos();
        let c = if self.convex { 1.0 } else { -1.0 };
        let a = 1.0 / (2.0 * sin_b);
        let b = 1.0 / (4.0 * cos_b);
        let d = a / std::f64::consts::SQRT_2;

        let n_bins = beams.nrows();
        let mut scale = [1.0; 4];
        if self.bin_mapping {
            let directions = MatrixHelper::beam_vectors(self.beam_angle, self.convex);
            for (beam, dir) in directions.rows().into_iter().enumerate() {
                let dir = arr1(&[sx * dir[0], dir[1], sz * dir[2]]);
                let vertical = m.row(2).dot(&dir).abs();
                scale[beam] = cos_b / vertical;
            }
        }

        for bin in 0..n_bins {
            let mut values = [f64::NAN; 4];
            let mut valid = true;
            for beam in 0..4 {
                let k = (bin + 1) as f64;
                let remapped = (k * scale[beam] + 0.5).floor();
                if !(1.0..=n_bins as f64).contains(&remapped) {
                    valid = false;
                    break;
                }
                values[beam] = beams[[remapped as usize - 1, beam]];
                if values[beam].is_nan() {
                    valid = false;
                    break;
                }
            }
            if !valid {
                continue;
            }
            let [b1, b2, b3, b4] = values;
            let instrument = arr1(&[
                sx * c * a * (b1 - b2),
                c * a * (b4 - b3),
                sz * b * (b1 + b2 + b3 + b4),
            ]);
            let enu = m.dot(&instrument);
            out[[bin, 0]] = enu[0];
            out[[bin, 1]] = enu[1];
            out[[bin, 2]] = enu[2];
            out[[bin, 3]] = d * (b1 + b2 - b3 - b4);
        }
    }
}

/// Stage wrapper that rotates beam-frame records and passes Earth-frame ones through.
pub struct RotationStage {
    params: Option<ProcessingParams>,
    logger: WarningLog,
}

impl RotationStage {
    pub fn new() -> Self {
        Self {
            params: None,
            logger: WarningLog::new(),
        }
    }
}

impl Default for RotationStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for RotationStage {
    fn initialize(&mut self, params: &ProcessingParams) -> StageResult<()> {
        self.params = Some(params.clone());
        Ok(())
    }

    fn execute(&mut self, mut record: InstrumentRecord) -> StageResult<StageOutput> {
        if self.params.is_none() {
            return Err(StageError::Internal("rotation stage not initialized".into()));
        }

        let serial = record.leader.serial_number.clone();
        if record.velocity_frame() == CoordinateFrame::Earth {
            let note = format!("{}: velocities already in Earth coordinates", serial);
            self.logger.record(&note);
            return Ok(StageOutput {
                record,
                metadata: StageMetadata {
                    notes: vec![note],
                    ..Default::default()
                },
            });
        }

        let rotator = CoordinateRotator::from_leader(&record.leader);
        let before = record.velocity.iter().filter(|v| v.is_nan()).count();
        record.velocity = rotator.rotate(&record.velocity, &record.ensembles);
        record.rotated = true;
        let after = record.velocity.iter().filter(|v| v.is_nan()).count();

        let note = format!(
            "{}: rotated {} ensembles to Earth coordinates",
            serial,
            record.n_ensembles()
        );
        self.logger.record(&note);
        Ok(StageOutput {
            record,
            metadata: StageMetadata {
                masked_samples: after.saturating_sub(before),
                notes: vec![note],
                ..Default::default()
            },
        })
    }

    fn cleanup(&mut self) {
        self.params = None;
    }
}
