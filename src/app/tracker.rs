use crate::core::accumulator::describe;
use crate::core::coordinator::EnrollmentCoordinator;
use crate::core::session::{RedirectParams, SessionContext, SessionPhase, SessionResolver};
use crate::core::subscriptions::{
    chart_points, due_label, format_currency, month_heading, monthly_summary, monthly_total,
    short_month, sort_subscriptions, SortOption,
};
use crate::domain::model::{ChannelId, EnrollmentForm, SignupForm};
use crate::domain::ports::{RemoteWriteClient, Storage, TrackerApi};
use crate::utils::error::{Result, TrackerError};
use crate::utils::validation::validate_non_empty_string;
use chrono::Utc;
use std::fmt::Write;
use std::sync::Arc;

/// 指令執行結果：要印出的文字與是否成功
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }

    fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: false,
        }
    }
}

/// 把 API、session 與訂閱協調者組合起來的應用層
pub struct TrackerApp<A, S>
where
    A: TrackerApi + RemoteWriteClient + 'static,
    S: Storage,
{
    api: Arc<A>,
    coordinator: EnrollmentCoordinator<A>,
    session: SessionResolver<S>,
}

impl<A, S> TrackerApp<A, S>
where
    A: TrackerApi + RemoteWriteClient + 'static,
    S: Storage,
{
    pub fn new(api: A, storage: S) -> Self {
        let api = Arc::new(api);
        Self {
            coordinator: EnrollmentCoordinator::from_shared(Arc::clone(&api)),
            api,
            session: SessionResolver::new(storage),
        }
    }

    /// 需要登入的指令：沒有有效 session 時回傳 SessionError
    async fn authenticated(&mut self) -> Result<SessionContext> {
        match self.session.resolve(None).await? {
            SessionPhase::Authenticated(ctx) => Ok(ctx.clone()),
            SessionPhase::Unauthenticated { reason } => Err(TrackerError::SessionError {
                reason: reason.clone(),
            }),
            other => Err(TrackerError::SessionError {
                reason: format!("session not settled: {:?}", other),
            }),
        }
    }

    pub async fn login(&mut self, redirect_url: &str) -> Result<CommandOutput> {
        let params = RedirectParams::parse(redirect_url)?;
        match self.session.resolve(Some(params)).await? {
            SessionPhase::Authenticated(ctx) => {
                let who = ctx
                    .user()
                    .map(|u| format!("{} <{}>", u.name, u.email))
                    .unwrap_or_default();
                Ok(CommandOutput::ok(format!("✅ Logged in as {}", who)))
            }
            SessionPhase::Unauthenticated { reason } => Err(TrackerError::SessionError {
                reason: reason.clone(),
            }),
            other => Err(TrackerError::SessionError {
                reason: format!("session not settled: {:?}", other),
            }),
        }
    }

    pub async fn logout(&mut self) -> Result<CommandOutput> {
        self.session.logout().await?;
        Ok(CommandOutput::ok("👋 Logged out."))
    }

    pub async fn whoami(&mut self) -> Result<CommandOutput> {
        let phase = self.session.resolve(None).await?;
        match phase.context().user() {
            Some(user) => Ok(CommandOutput::ok(format!(
                "{} <{}> (account {})",
                user.name, user.email, user.id
            ))),
            None => Ok(CommandOutput::failed("Not logged in.")),
        }
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<CommandOutput> {
        validate_non_empty_string("email", &form.email)?;
        validate_non_empty_string("password", &form.password)?;
        validate_non_empty_string("name", &form.name)?;
        validate_non_empty_string("given_name", &form.given_name)?;
        validate_non_empty_string("family_name", &form.family_name)?;

        self.api.signup(form).await?;
        Ok(CommandOutput::ok(format!(
            "✅ Account created for {}. Log in to continue.",
            form.email
        )))
    }

    pub async fn channels(&mut self) -> Result<CommandOutput> {
        let ctx = self.authenticated().await?;
        let token = ctx.require_token()?;
        let channels = self.api.list_channels(token).await?;

        if channels.is_empty() {
            return Ok(CommandOutput::ok("No channels available."));
        }

        let mut text = String::new();
        for channel in &channels {
            let marker = if channel.is_active() { "" } else { " (inactive)" };
            let _ = writeln!(text, "{:>6}  {}{}", channel.id, channel.channel_name, marker);
        }
        Ok(CommandOutput::ok(text.trim_end()))
    }

    pub async fn subscriptions(&mut self, sort: Option<SortOption>) -> Result<CommandOutput> {
        let ctx = self.authenticated().await?;
        let token = ctx.require_token()?;
        let subscriptions = self.api.list_subscriptions(token).await?;

        if subscriptions.is_empty() {
            return Ok(CommandOutput::ok("You have no subscriptions yet."));
        }

        let now = Utc::now();
        let mut text = String::new();
        for sub in sort_subscriptions(&subscriptions, sort) {
            let _ = writeln!(
                text,
                "{:<24} {:>10}  {}",
                sub.subscription_channel_name,
                format_currency(sub.monthly_bill),
                due_label(sub.next_due_date, now)
            );
        }
        let _ = write!(
            text,
            "Total per month: {}",
            format_currency(monthly_total(&subscriptions))
        );
        Ok(CommandOutput::ok(text))
    }

    pub async fn monthly_report(&mut self) -> Result<CommandOutput> {
        let ctx = self.authenticated().await?;
        let token = ctx.require_token()?;
        let entries = self.api.monthly_report(token).await?;

        if entries.is_empty() {
            return Ok(CommandOutput::ok("No spending recorded yet."));
        }

        let mut text = String::new();
        for entry in &entries {
            let _ = writeln!(
                text,
                "{} {}: {}",
                short_month(&entry.month),
                entry.year,
                format_currency(entry.cost)
            );
        }

        if let Some(summary) = monthly_summary(&entries) {
            let _ = writeln!(text);
            let _ = writeln!(text, "Total Months: {}", summary.total_months);
            let _ = writeln!(text, "Total Spending: ${:.2}", summary.total_spending);
            let _ = writeln!(text, "Highest Month: {}", summary.highest_month);
            let _ = writeln!(text, "Average Monthly: ${:.2}", summary.average_monthly);
        }
        Ok(CommandOutput::ok(text.trim_end()))
    }

    pub async fn month_to_month_report(&mut self) -> Result<CommandOutput> {
        let ctx = self.authenticated().await?;
        let token = ctx.require_token()?;
        let report = self.api.month_to_month_report(token).await?;

        if report.subscriptions.is_empty() {
            return Ok(CommandOutput::ok("No monthly report data found."));
        }

        let mut text = String::new();
        let _ = writeln!(text, "Monthly Analysis for {}", month_heading(&report));
        for (label, cost) in chart_points(&report) {
            let _ = writeln!(text, "{}: {}", label, format_currency(cost));
        }
        let _ = write!(text, "Total: {}", format_currency(report.total_cost));
        Ok(CommandOutput::ok(text))
    }

    /// 訂閱頻道；未登入時由協調者回報 MissingToken，不會送出任何請求
    pub async fn enroll(
        &mut self,
        channel_id: &ChannelId,
        form: &EnrollmentForm,
    ) -> Result<CommandOutput> {
        let ctx = self.session.resolve(None).await?.context();

        let outcome = self
            .coordinator
            .submit(channel_id, &ctx, form)
            .await
            .map_err(|e| TrackerError::ValidationError {
                message: e.to_string(),
            })?;

        let message = describe(&outcome);
        if outcome.is_committed() {
            Ok(CommandOutput::ok(format!("✅ {}", message)))
        } else {
            Ok(CommandOutput::failed(format!("❌ {}", message)))
        }
    }
}
