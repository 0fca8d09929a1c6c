use serde::{Deserialize, Serialize};

/// Selects which instrument, if any, is resampled onto the other's clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMode {
    #[default]
    None,
    /// Up-looker ensembles are picked at the down-looker's timestamps.
    UpToDown,
    /// Down-looker ensembles are picked at the up-looker's timestamps.
    DownToUp,
}

/// Parameter set shared by every stage of a cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParams {
    /// Bins whose four-beam percent-good is below this are removed.
    pub percent_good_limit: f64,
    /// Samples with |error velocity| above this lose east/north/vertical (m/s).
    pub error_velocity_limit: f64,
    /// Number of bins averaged together for high-frequency instruments.
    pub bin_average_factor: usize,
    /// Instruments at or above this frequency are bin averaged (kHz).
    pub high_frequency_khz: f64,
    /// Near-transducer range blanked while the package moves into its own wake (m).
    pub min_range_blank: f64,
    /// Lag search window in ensembles.
    pub max_lag: usize,
    pub lag_warning_threshold: usize,
    pub min_lag_correlation: f64,
    /// Seconds added to the up-looker clock before alignment.
    pub up_time_offset_s: f64,
    pub resample: ResampleMode,
    /// Distance between the up- and down-looking transducers (m).
    pub mount_offset: f64,
    /// 1-based bins removed from the down-looker.
    pub down_bin_mask: Vec<usize>,
    /// 1-based bins removed from the up-looker.
    pub up_bin_mask: Vec<usize>,
    /// Year used when the instrument clock carries no usable year.
    pub year_override: Option<i32>,
    pub zero_pressure: bool,
    pub ping_rate_tolerance_s: f64,
    /// Echo counts a surface peak must exceed the profile median by.
    pub surface_min_excess: f64,
    pub three_beam_warning_fraction: f64,
    /// Shallow down-looker bins used for the single-ping error estimate.
    pub ping_error_bins: usize,
    /// Beams (1-4) whose echo amplitude is kept in the merged profile.
    pub retained_beams: Vec<usize>,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            percent_good_limit: 50.0,
            error_velocity_limit: 0.5,
            bin_average_factor: 1,
            high_frequency_khz: 1200.0,
            min_range_blank: 0.0,
            max_lag: 20,
            lag_warning_threshold: 10,
            min_lag_correlation: 0.8,
            up_time_offset_s: 0.0,
            resample: ResampleMode::None,
            mount_offset: 0.0,
            down_bin_mask: Vec::new(),
            up_bin_mask: Vec::new(),
            year_override: None,
            zero_pressure: false,
            ping_rate_tolerance_s: 0.05,
            surface_min_excess: 20.0,
            three_beam_warning_fraction: 0.2,
            ping_error_bins: 3,
            retained_beams: Vec::new(),
        }
    }
}
