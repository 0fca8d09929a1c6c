use serde::Serialize;
use std::sync::Mutex;

/// Which screening step removed a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QcReason {
    BinMask,
    PercentGood,
    ErrorVelocity,
    ZeroEnsemble,
    BottomTrackDummy,
    BottomTrackScreen,
}

/// Counts of samples converted to NaN, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QcSummary {
    pub bin_masked: usize,
    pub percent_good: usize,
    pub error_velocity: usize,
    pub zero_ensembles: usize,
    pub bottom_track_dummies: usize,
    pub bottom_track_screened: usize,
}

pub struct QcRecorder {
    inner: Mutex<QcSummary>,
}

impl QcRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QcSummary::default()),
        }
    }

    pub fn record(&self, reason: QcReason, count: usize) {
        if let Ok(mut summary) = self.inner.lock() {
            let slot = match reason {
                QcReason::BinMask => &mut summary.bin_masked,
                QcReason::PercentGood => &mut summary.percent_good,
                QcReason::ErrorVelocity => &mut summary.error_velocity,
                QcReason::ZeroEnsemble => &mut summary.zero_ensembles,
                QcReason::BottomTrackDummy => &mut summary.bottom_track_dummies,
                QcReason::BottomTrackScreen => &mut summary.bottom_track_screened,
            };
            *slot += count;
        }
    }

    pub fn snapshot(&self) -> QcSummary {
        self.inner
            .lock()
            .map(|summary| *summary)
            .unwrap_or_default()
    }
}

impl Default for QcRecorder {
    fn default() -> Self {
        Self::new()
    }
}
