//! Processing core for lowered acoustic Doppler current profiler casts.
//!
//! One or two instruments on a rosette (a down-looker and, optionally, an
//! up-looker) are rotated to Earth coordinates, bin averaged, quality
//! screened, aligned on a common ensemble index and merged into one
//! depth-continuous profile.

pub mod cast;
pub mod math;
pub mod params;
pub mod prelude;
pub mod processing;
pub mod record;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use cast::CastAssembler;
pub use prelude::{ProcessingStage, StageError, StageOutput, StageResult};
