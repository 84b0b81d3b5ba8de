use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Idle,
    InFlight,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("an enrollment is already being submitted")]
pub struct SubmissionRejected;

/// 同一個 coordinator 同時只允許一個 submit（大小為 1 的 permit）
#[derive(Debug, Clone)]
pub struct SubmissionGuard {
    permits: Arc<Semaphore>,
}

/// 持有期間 guard 為 InFlight，drop 後釋放
#[derive(Debug)]
pub struct SubmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    /// 立即嘗試取得 permit，不等待
    pub fn try_enter(&self) -> Result<SubmissionPermit, SubmissionRejected> {
        self.permits
            .clone()
            .try_acquire_owned()
            .map(|permit| SubmissionPermit { _permit: permit })
            .map_err(|_| SubmissionRejected)
    }

    pub fn state(&self) -> GuardState {
        if self.permits.available_permits() == 0 {
            GuardState::InFlight
        } else {
            GuardState::Idle
        }
    }
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}
