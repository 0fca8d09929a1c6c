pub use crate::params::{ProcessingParams, ResampleMode};
pub use crate::record::InstrumentRecord;

/// Output produced by each per-instrument stage.
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub record: InstrumentRecord,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    /// Samples converted to NaN by this stage.
    pub masked_samples: usize,
    pub notes: Vec<String>,
    /// Recoverable problems to surface in the cast warning log.
    pub warnings: Vec<String>,
}

/// Common error type for record loading and stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("record source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("instrument clock reports implausible year {year}; set year_override")]
    ImplausibleYear { year: i32 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("shape mismatch in {channel}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        channel: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing the per-instrument processing stages.
pub trait ProcessingStage {
    fn initialize(&mut self, params: &ProcessingParams) -> StageResult<()>;
    fn execute(&mut self, record: InstrumentRecord) -> StageResult<StageOutput>;
    fn cleanup(&mut self);
}
