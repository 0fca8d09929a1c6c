use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::params::ResampleMode;
use crate::prelude::{StageError, StageResult};
use crate::record::{FixedLeader, InstrumentRecord, VariableLeader};
use crate::telemetry::QcSummary;

/// Instrument metadata plus its per-ensemble sensor channels on the joint index.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSeries {
    pub leader: FixedLeader,
    pub time: Array1<f64>,
    pub pitch: Array1<f64>,
    pub roll: Array1<f64>,
    pub heading: Array1<f64>,
    pub temperature: Array1<f64>,
    pub salinity: Array1<f64>,
    pub sound_velocity: Array1<f64>,
    pub xmit_current: Array1<f64>,
    pub xmit_voltage: Array1<f64>,
    pub internal_temperature: Array1<f64>,
    pub pressure: Array1<f64>,
    pub pressure_std: Array1<f64>,
}

impl InstrumentSeries {
    pub fn from_record(record: &InstrumentRecord) -> Self {
        let column = |f: fn(&VariableLeader) -> f64| -> Array1<f64> {
            record.ensembles.iter().map(f).collect()
        };
        Self {
            leader: record.leader.clone(),
            time: column(|e| e.time),
            pitch: column(|e| e.pitch),
            roll: column(|e| e.roll),
            heading: column(|e| e.heading),
            temperature: column(|e| e.temperature),
            salinity: column(|e| e.salinity),
            sound_velocity: column(|e| e.sound_velocity),
            xmit_current: column(|e| e.xmit_current),
            xmit_voltage: column(|e| e.xmit_voltage),
            internal_temperature: column(|e| e.internal_temperature),
            pressure: column(|e| e.pressure),
            pressure_std: column(|e| e.pressure_std),
        }
    }
}

/// Down-looker bottom track on the joint index.
#[derive(Debug, Clone, Serialize)]
pub struct BottomTrackSeries {
    /// Median of the four beam ranges (m).
    pub range: Array1<f64>,
    /// Ensemble × east/north/vertical/error (m/s).
    pub velocity: Array2<f64>,
}

/// How the sea surface was located from the up-looker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceMethod {
    SurfaceTrack,
    EchoMaximum,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurfaceSeries {
    pub method: SurfaceMethod,
    /// Distance from the up-looking transducer to the surface (m).
    pub range: Array1<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlignmentSummary {
    pub resample: ResampleMode,
    /// Target ensembles (on the clock being resampled onto) that could not be
    /// paired within 1 s.
    pub unpaired: usize,
    /// Up-looker index offset: down ensemble `i` pairs with up ensemble `i + lag`.
    pub lag: isize,
    pub correlation: f64,
    pub joint_ensembles: usize,
}

/// Echo amplitude of one beam kept alongside the beam-median channel.
#[derive(Debug, Clone, Serialize)]
pub struct RetainedEcho {
    /// 1-based beam number.
    pub beam: usize,
    pub values: Array2<f64>,
}

/// Depth-continuous, Earth-referenced profile of one cast.
///
/// Matrices are depth × ensemble. Depth rows run from the far up-looker bin,
/// through the mounting point, to the far down-looker bin.
#[derive(Debug, Clone, Serialize)]
pub struct MergedProfile {
    pub time: Array1<f64>,
    /// Bin offset below the down-looking transducer (m); up-looker bins are negative.
    pub depth_offset: Array1<f64>,
    pub up_bins: usize,
    pub down_bins: usize,
    pub u: Array2<f64>,
    pub v: Array2<f64>,
    pub w: Array2<f64>,
    pub error: Array2<f64>,
    pub target_strength: Array2<f64>,
    pub correlation: Array2<f64>,
    pub weight: Array2<f64>,
    pub retained_echo: Vec<RetainedEcho>,
    pub down: InstrumentSeries,
    pub up: Option<InstrumentSeries>,
    pub bottom_track: BottomTrackSeries,
    pub surface: Option<SurfaceSeries>,
    /// Platform tilt from the down-looker attitude (degrees).
    pub tilt: Array1<f64>,
    pub tilt_rate: Array1<f64>,
    /// Single-ping horizontal velocity error (m/s).
    pub single_ping_error: f64,
    pub three_beam_fraction_down: f64,
    pub three_beam_fraction_up: Option<f64>,
    pub alignment: Option<AlignmentSummary>,
    pub qc: QcSummary,
    pub warnings: Vec<String>,
}

impl MergedProfile {
    pub fn n_depth(&self) -> usize {
        self.depth_offset.len()
    }

    pub fn n_ensembles(&self) -> usize {
        self.time.len()
    }

    /// Serializes the profile; missing values are written as `null`.
    pub fn to_json(&self) -> StageResult<String> {
        serde_json::to_string(self)
            .map_err(|err| StageError::Internal(format!("serializing profile: {}", err)))
    }
}
