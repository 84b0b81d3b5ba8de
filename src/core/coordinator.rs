use crate::core::guard::{GuardState, SubmissionGuard, SubmissionRejected};
use crate::core::outcome::{
    EnrollmentAttempt, EnrollmentOutcome, EnrollmentState, FailureReason, RollbackStatus,
};
use crate::core::session::SessionContext;
use crate::domain::model::{
    AccountId, BearerToken, ChannelId, EnrollmentForm, NewSubscriptionDetail,
    NewSubscriptionEvent,
};
use crate::domain::ports::{RemoteWriteClient, WriteError};
use crate::utils::validation::validate_amount;
use std::future::Future;
use std::sync::Arc;

/// 訂閱流程的協調者：先建立 detail，再建立 event；
/// event 失敗時刪除已建立的 detail 作為補償。
pub struct EnrollmentCoordinator<C: RemoteWriteClient + 'static> {
    client: Arc<C>,
    guard: SubmissionGuard,
}

/// 單次 submit 期間不變的輸入
struct AttemptInput {
    channel_id: ChannelId,
    account_id: AccountId,
    token: BearerToken,
    form: EnrollmentForm,
}

impl<C: RemoteWriteClient + 'static> EnrollmentCoordinator<C> {
    pub fn new(client: C) -> Self {
        Self::from_shared(Arc::new(client))
    }

    pub fn from_shared(client: Arc<C>) -> Self {
        Self {
            client,
            guard: SubmissionGuard::new(),
        }
    }

    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    pub async fn submit(
        &self,
        channel_id: &ChannelId,
        session: &SessionContext,
        form: &EnrollmentForm,
    ) -> Result<EnrollmentOutcome, SubmissionRejected> {
        self.submit_traced(channel_id, session, form)
            .await
            .map(|attempt| attempt.outcome)
    }

    /// 與 `submit` 相同，另外回傳經過的狀態
    pub async fn submit_traced(
        &self,
        channel_id: &ChannelId,
        session: &SessionContext,
        form: &EnrollmentForm,
    ) -> Result<EnrollmentAttempt, SubmissionRejected> {
        let _permit = self.guard.try_enter().inspect_err(|_| {
            tracing::warn!(
                "⏳ Enrollment for channel {} rejected: another submission is in flight",
                channel_id
            );
        })?;

        let mut trail = vec![EnrollmentState::Idle];

        let input = match preflight(channel_id, session, form) {
            Ok(input) => input,
            Err(reason) => {
                tracing::warn!("🚫 Enrollment for channel {} not started: {:?}", channel_id, reason);
                let outcome = EnrollmentOutcome::not_attempted(reason.clone());
                trail.push(EnrollmentState::Failed {
                    reason,
                    rollback: RollbackStatus::NotAttempted,
                });
                return Ok(EnrollmentAttempt { outcome, trail });
            }
        };

        let mut state = EnrollmentState::DetailPending;
        let outcome = loop {
            trail.push(state.clone());
            if let Some(outcome) = state.terminal_outcome() {
                break outcome;
            }
            state = self.advance(state, &input).await;
        };

        Ok(EnrollmentAttempt { outcome, trail })
    }

    async fn advance(&self, state: EnrollmentState, input: &AttemptInput) -> EnrollmentState {
        match state {
            EnrollmentState::Idle => EnrollmentState::DetailPending,

            EnrollmentState::DetailPending => {
                tracing::info!("📝 Creating subscription detail for channel {}", input.channel_id);
                let payload = NewSubscriptionDetail {
                    subscription_channel_id: input.channel_id.clone(),
                    account_id: input.account_id.clone(),
                    form: input.form.clone(),
                };
                let client = Arc::clone(&self.client);
                let token = input.token.clone();
                let result =
                    isolated(async move { client.create_detail(&token, &payload).await }).await;

                match result {
                    Ok(detail_id) => {
                        tracing::info!("✅ Subscription detail {} created", detail_id);
                        EnrollmentState::DetailCreated { detail_id }
                    }
                    Err(WriteError::Conflict) => {
                        tracing::warn!(
                            "⚠️ Account {} is already subscribed to channel {}",
                            input.account_id,
                            input.channel_id
                        );
                        EnrollmentState::Failed {
                            reason: FailureReason::AlreadySubscribed,
                            rollback: RollbackStatus::NotAttempted,
                        }
                    }
                    Err(WriteError::Other(body)) => {
                        tracing::warn!("❌ Subscription detail creation failed: {}", body);
                        EnrollmentState::Failed {
                            reason: FailureReason::DetailCreation(body),
                            rollback: RollbackStatus::NotAttempted,
                        }
                    }
                }
            }

            EnrollmentState::DetailCreated { detail_id } => {
                EnrollmentState::EventPending { detail_id }
            }

            EnrollmentState::EventPending { detail_id } => {
                tracing::info!("📝 Creating subscription event for detail {}", detail_id);
                let payload = NewSubscriptionEvent {
                    subscription_detail_id: detail_id.clone(),
                    account_id: input.account_id.clone(),
                };
                let client = Arc::clone(&self.client);
                let token = input.token.clone();
                let result =
                    isolated(async move { client.create_event(&token, &payload).await }).await;

                match result {
                    Ok(event_id) => {
                        tracing::info!(
                            "🎉 Enrollment committed (detail {}, event {})",
                            detail_id,
                            event_id
                        );
                        EnrollmentState::Committed {
                            detail_id,
                            event_id,
                        }
                    }
                    // 409 在這一步不特別處理
                    Err(e) => {
                        tracing::warn!(
                            "❌ Subscription event creation failed for detail {}: {}",
                            detail_id,
                            e
                        );
                        EnrollmentState::RollbackPending {
                            detail_id,
                            cause: FailureReason::EventCreation(e.to_string()),
                        }
                    }
                }
            }

            EnrollmentState::RollbackPending { detail_id, cause } => {
                tracing::info!("↩️ Rolling back subscription detail {}", detail_id);
                let client = Arc::clone(&self.client);
                let token = input.token.clone();
                let id = detail_id.clone();
                // 只嘗試一次
                let result = isolated(async move { client.delete_detail(&token, &id).await }).await;

                let rollback = match result {
                    Ok(()) => {
                        tracing::info!("🧹 Subscription detail {} deleted", detail_id);
                        RollbackStatus::Succeeded
                    }
                    Err(e) => {
                        tracing::error!(
                            "🔥 Rollback failed, subscription detail {} is orphaned: {}",
                            detail_id,
                            e
                        );
                        RollbackStatus::Failed(e)
                    }
                };
                EnrollmentState::Failed {
                    reason: cause,
                    rollback,
                }
            }

            terminal @ (EnrollmentState::Committed { .. } | EnrollmentState::Failed { .. }) => {
                terminal
            }
        }
    }
}

fn preflight(
    channel_id: &ChannelId,
    session: &SessionContext,
    form: &EnrollmentForm,
) -> Result<AttemptInput, FailureReason> {
    let token = match session.token() {
        Some(token) if !token.is_blank() => token.clone(),
        _ => return Err(FailureReason::MissingToken),
    };
    let account_id = session
        .account_id()
        .cloned()
        .ok_or(FailureReason::MissingAccount)?;

    if channel_id.as_str().trim().is_empty() {
        return Err(FailureReason::InvalidForm("channel id is required".to_string()));
    }
    validate_amount("monthly_bill", form.monthly_bill)
        .map_err(|e| FailureReason::InvalidForm(e.to_string()))?;

    Ok(AttemptInput {
        channel_id: channel_id.clone(),
        account_id,
        token,
        form: form.clone(),
    })
}

/// 在獨立的 task 中執行遠端呼叫；panic 視同一般的失敗回應
async fn isolated<T, F>(call: F) -> Result<T, WriteError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, WriteError>> + Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(result) => result,
        Err(join_error) => Err(WriteError::Other(format!(
            "remote call aborted: {}",
            join_error
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::accumulator::describe;
    use crate::domain::model::{DetailId, EventId, User};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateDetail(String),
        CreateEvent(String),
        DeleteDetail(String),
    }

    #[derive(Clone)]
    enum Reply<T> {
        Ok(T),
        Err(WriteError),
        Panic,
    }

    impl<T: Clone> Reply<T> {
        fn resolve(&self) -> Result<T, WriteError> {
            match self {
                Reply::Ok(value) => Ok(value.clone()),
                Reply::Err(e) => Err(e.clone()),
                Reply::Panic => panic!("connection dropped"),
            }
        }
    }

    struct ScriptedClient {
        detail: Reply<DetailId>,
        event: Reply<EventId>,
        delete: Reply<()>,
        calls: Mutex<Vec<Call>>,
        // (entered, release)：讓 create_detail 停在半途
        hold: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl ScriptedClient {
        fn new() -> Self {
            Self {
                detail: Reply::Ok(DetailId::new("D1")),
                event: Reply::Ok(EventId::new("E1")),
                delete: Reply::Ok(()),
                calls: Mutex::new(Vec::new()),
                hold: None,
            }
        }

        fn detail(mut self, reply: Reply<DetailId>) -> Self {
            self.detail = reply;
            self
        }

        fn event(mut self, reply: Reply<EventId>) -> Self {
            self.event = reply;
            self
        }

        fn delete(mut self, reply: Reply<()>) -> Self {
            self.delete = reply;
            self
        }

        fn holding(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
            self.hold = Some((entered, release));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl RemoteWriteClient for ScriptedClient {
        async fn create_detail(
            &self,
            _token: &BearerToken,
            payload: &NewSubscriptionDetail,
        ) -> Result<DetailId, WriteError> {
            self.record(Call::CreateDetail(
                payload.subscription_channel_id.to_string(),
            ));
            if let Some((entered, release)) = &self.hold {
                entered.notify_one();
                release.notified().await;
            }
            self.detail.resolve()
        }

        async fn create_event(
            &self,
            _token: &BearerToken,
            payload: &NewSubscriptionEvent,
        ) -> Result<EventId, WriteError> {
            self.record(Call::CreateEvent(payload.subscription_detail_id.to_string()));
            self.event.resolve()
        }

        async fn delete_detail(
            &self,
            _token: &BearerToken,
            id: &DetailId,
        ) -> Result<(), WriteError> {
            self.record(Call::DeleteDetail(id.to_string()));
            self.delete.resolve()
        }
    }

    fn session() -> SessionContext {
        SessionContext::new(
            Some(BearerToken::new("token-123")),
            Some(User {
                id: AccountId::new("acc-1"),
                email: "user@example.com".to_string(),
                name: "User".to_string(),
            }),
        )
    }

    fn form() -> EnrollmentForm {
        EnrollmentForm::new(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            15.99,
        )
    }

    fn channel() -> ChannelId {
        ChannelId::new("ch-9")
    }

    #[tokio::test]
    async fn test_both_writes_succeed_commits_without_delete() {
        let client = Arc::new(ScriptedClient::new());
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let attempt = coordinator
            .submit_traced(&channel(), &session(), &form())
            .await
            .unwrap();

        assert_eq!(
            attempt.outcome,
            EnrollmentOutcome::Committed {
                detail_id: DetailId::new("D1"),
                event_id: EventId::new("E1"),
            }
        );
        assert_eq!(
            attempt.visited(),
            vec!["idle", "detail_pending", "detail_created", "event_pending", "committed"]
        );
        assert_eq!(
            client.calls(),
            vec![
                Call::CreateDetail("ch-9".to_string()),
                Call::CreateEvent("D1".to_string())
            ]
        );
        assert_eq!(coordinator.guard_state(), GuardState::Idle);
    }

    #[tokio::test]
    async fn test_conflict_stops_before_event_and_delete() {
        let client = Arc::new(ScriptedClient::new().detail(Reply::Err(WriteError::Conflict)));
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let outcome = coordinator.submit(&channel(), &session(), &form()).await.unwrap();

        assert_eq!(
            outcome,
            EnrollmentOutcome::Failed {
                reason: FailureReason::AlreadySubscribed,
                rollback: RollbackStatus::NotAttempted,
            }
        );
        assert!(describe(&outcome).contains("already have a subscription"));
        assert_eq!(client.calls(), vec![Call::CreateDetail("ch-9".to_string())]);
    }

    #[tokio::test]
    async fn test_generic_detail_failure_surfaces_body() {
        let client = Arc::new(
            ScriptedClient::new()
                .detail(Reply::Err(WriteError::Other("channel not found".to_string()))),
        );
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let outcome = coordinator.submit(&channel(), &session(), &form()).await.unwrap();

        assert_eq!(
            outcome,
            EnrollmentOutcome::Failed {
                reason: FailureReason::DetailCreation("channel not found".to_string()),
                rollback: RollbackStatus::NotAttempted,
            }
        );
        assert!(describe(&outcome).contains("channel not found"));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_event_failure_deletes_held_detail_once() {
        let client = Arc::new(
            ScriptedClient::new().event(Reply::Err(WriteError::Other("db down".to_string()))),
        );
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let attempt = coordinator
            .submit_traced(&channel(), &session(), &form())
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![
                Call::CreateDetail("ch-9".to_string()),
                Call::CreateEvent("D1".to_string()),
                Call::DeleteDetail("D1".to_string()),
            ]
        );
        assert_eq!(
            attempt.outcome.rollback(),
            Some(&RollbackStatus::Succeeded)
        );
        assert!(attempt.visited().contains(&"rollback_pending"));
        assert!(describe(&attempt.outcome).contains("Rollback succeeded"));
    }

    #[tokio::test]
    async fn test_failed_delete_is_reported_not_retried() {
        let client = Arc::new(
            ScriptedClient::new()
                .event(Reply::Err(WriteError::Conflict))
                .delete(Reply::Err(WriteError::Other("503".to_string()))),
        );
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let outcome = coordinator.submit(&channel(), &session(), &form()).await.unwrap();

        let deletes = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::DeleteDetail(_)))
            .count();
        assert_eq!(deletes, 1);
        assert!(matches!(
            outcome,
            EnrollmentOutcome::Failed {
                reason: FailureReason::EventCreation(_),
                rollback: RollbackStatus::Failed(_),
            }
        ));
        let message = describe(&outcome);
        assert!(message.contains("Rollback failed"));
        assert!(!message.contains("already have a subscription"));
    }

    #[tokio::test]
    async fn test_panicking_event_call_still_compensates() {
        let client = Arc::new(ScriptedClient::new().event(Reply::Panic));
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let outcome = coordinator.submit(&channel(), &session(), &form()).await.unwrap();

        assert_eq!(
            client.calls().last(),
            Some(&Call::DeleteDetail("D1".to_string()))
        );
        assert_eq!(outcome.rollback(), Some(&RollbackStatus::Succeeded));
        assert_eq!(coordinator.guard_state(), GuardState::Idle);
    }

    #[tokio::test]
    async fn test_panicking_delete_counts_as_failed_rollback() {
        let client = Arc::new(
            ScriptedClient::new()
                .event(Reply::Err(WriteError::Other("nope".to_string())))
                .delete(Reply::Panic),
        );
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        let outcome = coordinator.submit(&channel(), &session(), &form()).await.unwrap();

        assert!(matches!(
            outcome.rollback(),
            Some(RollbackStatus::Failed(WriteError::Other(_)))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_makes_no_calls() {
        let client = Arc::new(ScriptedClient::new());
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());
        let anonymous = SessionContext::anonymous();

        let attempt = coordinator
            .submit_traced(&channel(), &anonymous, &form())
            .await
            .unwrap();

        assert_eq!(
            attempt.outcome,
            EnrollmentOutcome::Failed {
                reason: FailureReason::MissingToken,
                rollback: RollbackStatus::NotAttempted,
            }
        );
        assert_eq!(attempt.visited(), vec!["idle", "failed"]);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_negative_amount_is_rejected_before_network() {
        let client = Arc::new(ScriptedClient::new());
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());
        let mut bad_form = form();
        bad_form.monthly_bill = -3.0;

        let outcome = coordinator
            .submit(&channel(), &session(), &bad_form)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            EnrollmentOutcome::Failed {
                reason: FailureReason::InvalidForm(_),
                ..
            }
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected_by_guard() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let client =
            Arc::new(ScriptedClient::new().holding(entered.clone(), release.clone()));
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());
        let (channel, session, form) = (channel(), session(), form());

        let first = coordinator.submit(&channel, &session, &form);
        let second = async {
            entered.notified().await;
            assert_eq!(coordinator.guard_state(), GuardState::InFlight);
            let rejected = coordinator.submit(&channel, &session, &form).await;
            release.notify_one();
            rejected
        };

        let (first, second) = tokio::join!(first, second);

        assert_eq!(second.unwrap_err(), SubmissionRejected);
        assert!(first.unwrap().is_committed());
        assert_eq!(
            client.calls(),
            vec![
                Call::CreateDetail("ch-9".to_string()),
                Call::CreateEvent("D1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_resubmit_after_rollback_creates_new_detail() {
        let client = Arc::new(
            ScriptedClient::new().event(Reply::Err(WriteError::Other("flaky".to_string()))),
        );
        let coordinator = EnrollmentCoordinator::from_shared(client.clone());

        coordinator.submit(&channel(), &session(), &form()).await.unwrap();
        coordinator.submit(&channel(), &session(), &form()).await.unwrap();

        let creates = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::CreateDetail(_)))
            .count();
        assert_eq!(creates, 2);
    }
}
