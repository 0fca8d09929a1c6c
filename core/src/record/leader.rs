use serde::{Deserialize, Serialize};

/// Which way the transducer head points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Down,
    Up,
}

/// Frame the instrument recorded its velocities in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateFrame {
    Beam,
    Earth,
}

/// Instrument hardware family. Broadband units can emit all-zero ensembles
/// that must be screened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    Workhorse,
    Broadband,
}

/// Per-instrument constants from the fixed leader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedLeader {
    pub n_bins: usize,
    pub pings_per_ensemble: u32,
    /// Bin length (m).
    pub bin_length: f64,
    /// Blank after transmit (m).
    pub blank_distance: f64,
    /// Distance from the transducer to the centre of bin 1 (m).
    pub first_bin_distance: f64,
    /// Transmit pulse length (m).
    pub pulse_length: f64,
    pub serial_number: String,
    /// Beam angle from the instrument axis (degrees).
    pub beam_angle: f64,
    pub orientation: Orientation,
    pub frame: CoordinateFrame,
    /// Acoustic frequency (kHz).
    pub frequency_khz: f64,
    pub convex: bool,
    pub bin_mapping: bool,
    pub family: InstrumentFamily,
}

impl FixedLeader {
    /// Nominal distance from the transducer to the centre of 0-based bin `index`.
    pub fn bin_distance(&self, index: usize) -> f64 {
        self.first_bin_distance + index as f64 * self.bin_length
    }

    pub fn bin_distances(&self) -> Vec<f64> {
        (0..self.n_bins).map(|k| self.bin_distance(k)).collect()
    }

    pub fn is_up(&self) -> bool {
        self.orientation == Orientation::Up
    }
}

/// Per-ensemble sensor values from the variable leader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VariableLeader {
    /// Continuous day number.
    pub time: f64,
    pub pitch: f64,
    pub roll: f64,
    pub heading: f64,
    pub temperature: f64,
    pub salinity: f64,
    pub sound_velocity: f64,
    pub xmit_current: f64,
    pub xmit_voltage: f64,
    pub internal_temperature: f64,
    pub pressure: f64,
    pub pressure_std: f64,
}

impl VariableLeader {
    /// An ensemble with every sensor value missing.
    pub fn missing(time: f64) -> Self {
        Self {
            time,
            pitch: f64::NAN,
            roll: f64::NAN,
            heading: f64::NAN,
            temperature: f64::NAN,
            salinity: f64::NAN,
            sound_velocity: f64::NAN,
            xmit_current: f64::NAN,
            xmit_voltage: f64::NAN,
            internal_temperature: f64::NAN,
            pressure: f64::NAN,
            pressure_std: f64::NAN,
        }
    }

    /// A level ensemble with nominal seawater sensor values.
    pub fn level(time: f64) -> Self {
        Self {
            time,
            pitch: 0.0,
            roll: 0.0,
            heading: 0.0,
            temperature: 10.0,
            salinity: 35.0,
            sound_velocity: 1500.0,
            xmit_current: 1.0,
            xmit_voltage: 40.0,
            internal_temperature: 10.0,
            pressure: 0.0,
            pressure_std: 0.0,
        }
    }
}
