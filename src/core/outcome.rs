use crate::domain::model::{DetailId, EventId};
use crate::domain::ports::WriteError;

/// 失敗的根本原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// session 中沒有 bearer token，未發出任何請求
    MissingToken,
    /// session 中沒有帳號資訊
    MissingAccount,
    InvalidForm(String),
    /// 建立 detail 時收到 409
    AlreadySubscribed,
    DetailCreation(String),
    EventCreation(String),
}

/// 補償（刪除 detail）的結果，只作為資訊回報
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackStatus {
    NotAttempted,
    Succeeded,
    Failed(WriteError),
}

impl RollbackStatus {
    pub fn was_attempted(&self) -> bool {
        !matches!(self, RollbackStatus::NotAttempted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Committed {
        detail_id: DetailId,
        event_id: EventId,
    },
    Failed {
        reason: FailureReason,
        rollback: RollbackStatus,
    },
}

impl EnrollmentOutcome {
    pub(crate) fn not_attempted(reason: FailureReason) -> Self {
        EnrollmentOutcome::Failed {
            reason,
            rollback: RollbackStatus::NotAttempted,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, EnrollmentOutcome::Committed { .. })
    }

    pub fn rollback(&self) -> Option<&RollbackStatus> {
        match self {
            EnrollmentOutcome::Committed { .. } => None,
            EnrollmentOutcome::Failed { rollback, .. } => Some(rollback),
        }
    }
}

/// 狀態機的各個狀態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentState {
    Idle,
    DetailPending,
    DetailCreated { detail_id: DetailId },
    EventPending { detail_id: DetailId },
    RollbackPending { detail_id: DetailId, cause: FailureReason },
    Committed { detail_id: DetailId, event_id: EventId },
    Failed { reason: FailureReason, rollback: RollbackStatus },
}

impl EnrollmentState {
    /// 終止狀態對應的結果；非終止狀態回傳 None
    pub fn terminal_outcome(&self) -> Option<EnrollmentOutcome> {
        match self {
            EnrollmentState::Committed {
                detail_id,
                event_id,
            } => Some(EnrollmentOutcome::Committed {
                detail_id: detail_id.clone(),
                event_id: event_id.clone(),
            }),
            EnrollmentState::Failed { reason, rollback } => Some(EnrollmentOutcome::Failed {
                reason: reason.clone(),
                rollback: rollback.clone(),
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EnrollmentState::Idle => "idle",
            EnrollmentState::DetailPending => "detail_pending",
            EnrollmentState::DetailCreated { .. } => "detail_created",
            EnrollmentState::EventPending { .. } => "event_pending",
            EnrollmentState::RollbackPending { .. } => "rollback_pending",
            EnrollmentState::Committed { .. } => "committed",
            EnrollmentState::Failed { .. } => "failed",
        }
    }
}

/// 一次 submit 的完整紀錄：最終結果與經過的狀態
#[derive(Debug, Clone)]
pub struct EnrollmentAttempt {
    pub outcome: EnrollmentOutcome,
    pub trail: Vec<EnrollmentState>,
}

impl EnrollmentAttempt {
    pub fn visited(&self) -> Vec<&'static str> {
        self.trail.iter().map(EnrollmentState::name).collect()
    }
}
