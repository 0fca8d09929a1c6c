//! Instrument records as delivered by a [`RecordSource`] and the merged
//! cast profile handed to downstream stages.

pub mod bottom;
pub mod instrument;
pub mod leader;
pub mod profile;
pub mod source;

pub use bottom::BottomTrack;
pub use instrument::{beam_median, InstrumentRecord, UnaveragedBackup};
pub use leader::{CoordinateFrame, FixedLeader, InstrumentFamily, Orientation, VariableLeader};
pub use profile::{
    AlignmentSummary, BottomTrackSeries, InstrumentSeries, MergedProfile, RetainedEcho,
    SurfaceMethod, SurfaceSeries,
};
pub use source::{MemorySource, RecordSource};

/// Raw "no data" value (-32768 in mm/s or mm) once scaled to SI units.
pub const SENTINEL: f64 = -32.768;

pub(crate) fn is_sentinel(value: f64) -> bool {
    (value - SENTINEL).abs() < 5e-4
}
