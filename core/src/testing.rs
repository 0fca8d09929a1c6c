//! Record builders shared by the unit tests.

use ndarray::{s, Array3};

use crate::record::instrument::{EAST, ERROR, NORTH, VERTICAL};
use crate::record::{
    CoordinateFrame, FixedLeader, InstrumentFamily, InstrumentRecord, Orientation, VariableLeader,
};

/// Level ensembles one second apart starting at day `t0`.
pub fn level_ensembles(n: usize, t0: f64) -> Vec<VariableLeader> {
    (0..n)
        .map(|i| VariableLeader::level(t0 + i as f64 / 86_400.0))
        .collect()
}

/// Deterministic pseudo-random series in `[-0.5, 0.5)` with no periodic structure.
pub fn noise(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
        })
        .collect()
}

/// 300 kHz, 20 degree convex head with 2 m bins starting 6 m out.
pub fn leader(n_bins: usize, orientation: Orientation, frame: CoordinateFrame) -> FixedLeader {
    FixedLeader {
        n_bins,
        pings_per_ensemble: 1,
        bin_length: 2.0,
        blank_distance: 1.76,
        first_bin_distance: 6.0,
        pulse_length: 2.0,
        serial_number: match orientation {
            Orientation::Down => "DN01".into(),
            Orientation::Up => "UP01".into(),
        },
        beam_angle: 20.0,
        orientation,
        frame,
        frequency_khz: 300.0,
        convex: true,
        bin_mapping: true,
        family: InstrumentFamily::Workhorse,
    }
}

fn uniform_record(
    n_ens: usize,
    n_bins: usize,
    orientation: Orientation,
    frame: CoordinateFrame,
    velocity: Array3<f64>,
) -> InstrumentRecord {
    let shape = (n_ens, n_bins, 4);
    InstrumentRecord::new(
        leader(n_bins, orientation, frame),
        level_ensembles(n_ens, 100.0),
        velocity,
        Array3::from_elem(shape, 120.0),
        Array3::from_elem(shape, 50.0),
        Array3::from_elem(shape, 100.0),
        None,
        2020,
    )
    .expect("consistent test record")
}

fn earth_velocity(n_ens: usize, n_bins: usize, w: f64) -> Array3<f64> {
    let mut velocity = Array3::zeros((n_ens, n_bins, 4));
    velocity.slice_mut(s![.., .., EAST]).fill(0.1);
    velocity.slice_mut(s![.., .., NORTH]).fill(-0.1);
    velocity.slice_mut(s![.., .., VERTICAL]).fill(w);
    velocity.slice_mut(s![.., .., ERROR]).fill(0.0);
    velocity
}

/// Down-looker recorded in Earth coordinates: u = 0.1, v = -0.1, error 0.
pub fn earth_record(n_ens: usize, n_bins: usize, w: f64) -> InstrumentRecord {
    uniform_record(
        n_ens,
        n_bins,
        Orientation::Down,
        CoordinateFrame::Earth,
        earth_velocity(n_ens, n_bins, w),
    )
}

/// Up-looker counterpart of [`earth_record`].
pub fn up_record(n_ens: usize, n_bins: usize, w: f64) -> InstrumentRecord {
    uniform_record(
        n_ens,
        n_bins,
        Orientation::Up,
        CoordinateFrame::Earth,
        earth_velocity(n_ens, n_bins, w),
    )
}

/// Down-looker recorded in beam coordinates.
pub fn beam_record(n_ens: usize, n_bins: usize, velocity: Array3<f64>) -> InstrumentRecord {
    uniform_record(n_ens, n_bins, Orientation::Down, CoordinateFrame::Beam, velocity)
}
