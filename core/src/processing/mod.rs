pub mod align;
pub mod bin_average;
pub mod diagnostics;
pub mod lag;
pub mod merge;
pub mod quality;
pub mod rotation;
pub mod surface;

pub use align::TimeAligner;
pub use bin_average::{BinAverageStage, BinAverager};
pub use diagnostics::Diagnostics;
pub use lag::{LagCorrelator, LagResult};
pub use merge::ProfileMerger;
pub use quality::{QualityFilter, QualityStage};
pub use rotation::{CoordinateRotator, RotationStage};
pub use surface::SurfaceStrategy;
