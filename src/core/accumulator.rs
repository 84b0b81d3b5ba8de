use crate::core::outcome::{EnrollmentOutcome, FailureReason, RollbackStatus};

pub const SUCCESS_MESSAGE: &str = "Subscription created successfully.";
pub const ROLLBACK_SUCCEEDED: &str = "Rollback succeeded: subscription detail deleted.";
pub const ROLLBACK_FAILED: &str = "Rollback failed: could not delete subscription detail.";

/// 通知中的一個片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Committed,
    RootCause(FailureReason),
    Compensation(RollbackStatus),
}

/// 收集失敗與補償事件，最後投影成一則訊息
#[derive(Debug, Default, Clone)]
pub struct ErrorAccumulator {
    notices: Vec<Notice>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outcome(outcome: &EnrollmentOutcome) -> Self {
        let mut acc = Self::new();
        match outcome {
            EnrollmentOutcome::Committed { .. } => acc.push(Notice::Committed),
            EnrollmentOutcome::Failed { reason, rollback } => {
                acc.push(Notice::RootCause(reason.clone()));
                // 沒有嘗試補償就不附加補償片段
                if rollback.was_attempted() {
                    acc.push(Notice::Compensation(rollback.clone()));
                }
            }
        }
        acc
    }

    pub fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn render(&self) -> String {
        self.notices
            .iter()
            .map(fragment)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 將結果轉成給使用者看的單一訊息
pub fn describe(outcome: &EnrollmentOutcome) -> String {
    ErrorAccumulator::from_outcome(outcome).render()
}

fn fragment(notice: &Notice) -> String {
    match notice {
        Notice::Committed => SUCCESS_MESSAGE.to_string(),
        Notice::RootCause(reason) => root_cause_text(reason),
        Notice::Compensation(RollbackStatus::Succeeded) => ROLLBACK_SUCCEEDED.to_string(),
        Notice::Compensation(RollbackStatus::Failed(_)) => ROLLBACK_FAILED.to_string(),
        Notice::Compensation(RollbackStatus::NotAttempted) => String::new(),
    }
}

fn root_cause_text(reason: &FailureReason) -> String {
    match reason {
        FailureReason::MissingToken => "You must be logged in to subscribe to a channel.".to_string(),
        FailureReason::MissingAccount => {
            "Your session has no account information; please log in again.".to_string()
        }
        FailureReason::InvalidForm(message) => format!("Invalid subscription form: {}", message),
        FailureReason::AlreadySubscribed => {
            "You already have a subscription to this channel.".to_string()
        }
        FailureReason::DetailCreation(body) => {
            format!("Failed to create subscription detail: {}", body)
        }
        FailureReason::EventCreation(body) => {
            format!("Failed to create subscription event: {}", body)
        }
    }
}
