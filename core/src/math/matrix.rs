use ndarray::{arr2, Array2};

pub struct MatrixHelper;

impl MatrixHelper {
    /// Instrument-to-Earth rotation for heading, pitch and roll in degrees.
    ///
    /// Rows map instrument x/y/z onto east, north and up.
    pub fn attitude_matrix(heading: f64, pitch: f64, roll: f64) -> Array2<f64> {
        let (sh, ch) = heading.to_radians().sin_cos();
        let (sp, cp) = pitch.to_radians().sin_cos();
        let (sr, cr) = roll.to_radians().sin_cos();
        arr2(&[
            [ch * cr + sh * sp * sr, sh * cp, ch * sr - sh * sp * cr],
            [-sh * cr + ch * sp * sr, ch * cp, -sh * sr - ch * sp * cr],
            [-cp * sr, sp, cp * cr],
        ])
    }

    /// Outward unit vectors of beams 1-4 in instrument coordinates (rows).
    ///
    /// Beams 1/2 lie in the x plane and 3/4 in the y plane; a concave head
    /// crosses each pair.
    pub fn beam_vectors(beam_angle: f64, convex: bool) -> Array2<f64> {
        let (s, c) = beam_angle.to_radians().sin_cos();
        let h = if convex { s } else { -s };
        arr2(&[
            [-h, 0.0, -c],
            [h, 0.0, -c],
            [0.0, h, -c],
            [0.0, -h, -c],
        ])
    }
}
