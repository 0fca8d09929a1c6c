pub mod log;
pub mod metrics;

pub use self::log::WarningLog;
pub use metrics::{QcReason, QcRecorder, QcSummary};
