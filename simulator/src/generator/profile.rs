use anyhow::{ensure, Context};
use ladcpcore::record::{
    BottomTrack, CoordinateFrame, FixedLeader, InstrumentFamily, InstrumentRecord, Orientation,
    VariableLeader, SENTINEL,
};
use ndarray::{Array2, Array3};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const SECONDS_PER_DAY: f64 = 86_400.0;
/// Winch lowering speed (m/s).
const LOWERING_SPEED: f64 = 1.0;

/// Configuration for generating a synthetic two-instrument cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CastScenario {
    pub ensembles: usize,
    pub down_bins: usize,
    pub up_bins: usize,
    pub two_instruments: bool,
    /// Up-looker ensemble index offset: down ensemble `i` matches up `i + lag`.
    pub lag: usize,
    /// Per-sample velocity noise (m/s).
    pub noise: f64,
    /// Share of bottom-track ensembles written as dummies.
    pub bottom_dummy_fraction: f64,
    /// Water depth below the start of the cast (m).
    pub bottom_depth: f64,
    pub seed: u64,
    pub start_day: f64,
    pub clock_year: i32,
}

impl Default for CastScenario {
    fn default() -> Self {
        Self {
            ensembles: 400,
            down_bins: 20,
            up_bins: 16,
            two_instruments: true,
            lag: 5,
            noise: 0.02,
            bottom_dummy_fraction: 0.1,
            bottom_depth: 450.0,
            seed: 0,
            start_day: 150.0,
            clock_year: 2024,
        }
    }
}

pub struct SyntheticCast {
    pub down: InstrumentRecord,
    pub up: Option<InstrumentRecord>,
}

fn leader(n_bins: usize, orientation: Orientation) -> FixedLeader {
    FixedLeader {
        n_bins,
        pings_per_ensemble: 1,
        bin_length: 8.0,
        blank_distance: 1.76,
        first_bin_distance: 12.5,
        pulse_length: 8.0,
        serial_number: match orientation {
            Orientation::Down => "SIM-DN".into(),
            Orientation::Up => "SIM-UP".into(),
        },
        beam_angle: 20.0,
        orientation,
        frame: CoordinateFrame::Earth,
        frequency_khz: 300.0,
        convex: true,
        bin_mapping: true,
        family: InstrumentFamily::Workhorse,
    }
}

/// Package vertical velocity: steady lowering plus ship heave.
fn package_motion(n: usize, rng: &mut StdRng) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let heave = 0.3 * (2.0 * PI * i as f64 / 11.0).sin();
            -LOWERING_SPEED + heave + rng.gen_range(-0.1..0.1)
        })
        .collect()
}

fn instrument(
    scenario: &CastScenario,
    orientation: Orientation,
    n_bins: usize,
    relative_w: &[f64],
    rng: &mut StdRng,
) -> anyhow::Result<InstrumentRecord> {
    let n = relative_w.len();
    let shape = (n, n_bins, 4);
    let mut velocity = Array3::zeros(shape);
    for (e, &w) in relative_w.iter().enumerate() {
        for b in 0..n_bins {
            let mut jitter = || rng.gen_range(-scenario.noise..=scenario.noise);
            velocity[[e, b, 0]] = 0.1 + jitter();
            velocity[[e, b, 1]] = -0.05 + jitter();
            velocity[[e, b, 2]] = w + jitter();
            velocity[[e, b, 3]] = 0.5 * jitter();
        }
    }
    let echo = Array3::from_shape_fn(shape, |(_, b, _)| 150.0 - 3.0 * b as f64);

    let ensembles = (0..n)
        .map(|i| {
            let mut ensemble = VariableLeader::level(scenario.start_day + i as f64 / SECONDS_PER_DAY);
            ensemble.pitch = rng.gen_range(-3.0..3.0);
            ensemble.roll = rng.gen_range(-3.0..3.0);
            ensemble.heading = rng.gen_range(0.0..360.0);
            ensemble.pressure = LOWERING_SPEED * i as f64;
            ensemble
        })
        .collect();

    InstrumentRecord::new(
        leader(n_bins, orientation),
        ensembles,
        velocity,
        Array3::from_elem(shape, 110.0),
        echo,
        Array3::from_elem(shape, 100.0),
        None,
        scenario.clock_year,
    )
    .with_context(|| format!("building synthetic {:?}-looker record", orientation))
}

/// Down-looker bottom track with evenly spaced dummy ensembles.
fn bottom_track(scenario: &CastScenario, package_w: &[f64]) -> anyhow::Result<BottomTrack> {
    let n = package_w.len();
    let dummies = (scenario.bottom_dummy_fraction * n as f64).round() as usize;
    let stride = if dummies > 0 { n / dummies } else { 0 };
    let mut raw = Array2::zeros((n, 8));
    for (i, &w) in package_w.iter().enumerate() {
        let range = (scenario.bottom_depth - LOWERING_SPEED * i as f64).max(1.0);
        for beam in 0..4 {
            raw[[i, beam]] = range;
        }
        raw[[i, 6]] = -w;
        if stride > 0 && i % stride == 0 && i / stride < dummies {
            for col in 4..8 {
                raw[[i, col]] = SENTINEL;
            }
        }
    }
    BottomTrack::from_raw(raw).context("building synthetic bottom track")
}

pub fn build_cast(scenario: &CastScenario) -> anyhow::Result<SyntheticCast> {
    ensure!(scenario.ensembles > scenario.lag, "cast shorter than its lag");
    ensure!(scenario.down_bins > 0, "down-looker needs at least one bin");

    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let package_w = package_motion(scenario.ensembles, &mut rng);
    // water appears to move opposite to the package
    let relative: Vec<f64> = package_w.iter().map(|w| -w).collect();

    let mut down = instrument(scenario, Orientation::Down, scenario.down_bins, &relative, &mut rng)?;
    down.bottom_track = Some(bottom_track(scenario, &package_w)?);

    let up = if scenario.two_instruments && scenario.up_bins > 0 {
        let lagged: Vec<f64> = (0..scenario.ensembles)
            .map(|j| {
                if j >= scenario.lag {
                    relative[j - scenario.lag]
                } else {
                    LOWERING_SPEED + rng.gen_range(-0.1..0.1)
                }
            })
            .collect();
        Some(instrument(scenario, Orientation::Up, scenario.up_bins, &lagged, &mut rng)?)
    } else {
        None
    };

    Ok(SyntheticCast { down, up })
}
