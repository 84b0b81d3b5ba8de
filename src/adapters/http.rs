use crate::domain::model::{
    BearerToken, Channel, CreatedRecord, DetailId, EventId, MonthToMonthReport,
    MonthlyReportEntry, NewSubscriptionDetail, NewSubscriptionEvent, SignupForm,
    UserSubscription,
};
use crate::domain::ports::{ConfigProvider, RemoteWriteClient, TrackerApi, WriteError};
use crate::utils::error::{Result, TrackerError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

/// SubscriTrack 後端的 HTTP 用戶端（`{base}/v1/...`）
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let mut builder = Client::builder();
        // 預設不設逾時
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: config.api_base_url().to_string(),
            client: builder.build()?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder, token: &BearerToken) -> RequestBuilder {
        request
            .bearer_auth(token.expose())
            .header("Content-Type", "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, token: &BearerToken, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        tracing::debug!("📡 GET {}", url);

        let response = self.authorized(self.client.get(&url), token).send().await?;
        let status = response.status();
        tracing::debug!("📡 API response status: {}", status);

        if !status.is_success() {
            return Err(TrackerError::ApiError {
                status: status.as_u16(),
                message: format!("HTTP error! status: {}", status.as_u16()),
            });
        }

        Ok(response.json().await?)
    }
}

/// 2xx 直接通過；409 為 Conflict；其餘帶回原始內容
async fn classify(response: Response) -> std::result::Result<Response, WriteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::CONFLICT {
        return Err(WriteError::Conflict);
    }

    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        Err(WriteError::Other(format!(
            "HTTP error! status: {}",
            status.as_u16()
        )))
    } else {
        Err(WriteError::Other(body))
    }
}

async fn created_id<Id: DeserializeOwned>(
    response: Response,
) -> std::result::Result<Id, WriteError> {
    let response = classify(response).await?;
    response
        .json::<CreatedRecord<Id>>()
        .await
        .map(|record| record.id)
        .map_err(|e| WriteError::Other(format!("invalid response from server: {}", e)))
}

fn transport(e: reqwest::Error) -> WriteError {
    WriteError::Other(e.to_string())
}

#[async_trait]
impl RemoteWriteClient for ApiClient {
    async fn create_detail(
        &self,
        token: &BearerToken,
        payload: &NewSubscriptionDetail,
    ) -> std::result::Result<DetailId, WriteError> {
        let url = self.endpoint("subscription-details");
        tracing::debug!("📡 POST {}", url);
        let response = self
            .authorized(self.client.post(&url), token)
            .json(payload)
            .send()
            .await
            .map_err(transport)?;
        created_id(response).await
    }

    async fn create_event(
        &self,
        token: &BearerToken,
        payload: &NewSubscriptionEvent,
    ) -> std::result::Result<EventId, WriteError> {
        let url = self.endpoint("subscription-events");
        tracing::debug!("📡 POST {}", url);
        let response = self
            .authorized(self.client.post(&url), token)
            .json(payload)
            .send()
            .await
            .map_err(transport)?;
        created_id(response).await
    }

    async fn delete_detail(
        &self,
        token: &BearerToken,
        id: &DetailId,
    ) -> std::result::Result<(), WriteError> {
        let url = self.endpoint(&format!("subscription-details/{}", id));
        tracing::debug!("📡 DELETE {}", url);
        let response = self
            .authorized(self.client.delete(&url), token)
            .send()
            .await
            .map_err(transport)?;
        classify(response).await.map(|_| ())
    }
}

#[async_trait]
impl TrackerApi for ApiClient {
    async fn list_channels(&self, token: &BearerToken) -> Result<Vec<Channel>> {
        self.get_json(token, "subscription-channels").await
    }

    async fn list_subscriptions(&self, token: &BearerToken) -> Result<Vec<UserSubscription>> {
        self.get_json(token, "user-subscription-details").await
    }

    async fn monthly_report(&self, token: &BearerToken) -> Result<Vec<MonthlyReportEntry>> {
        self.get_json(token, "analysis/monthly-report").await
    }

    async fn month_to_month_report(&self, token: &BearerToken) -> Result<MonthToMonthReport> {
        self.get_json(token, "analysis/month-by-month-report").await
    }

    async fn signup(&self, form: &SignupForm) -> Result<serde_json::Value> {
        let url = self.endpoint("auth/signup");
        tracing::debug!("📡 POST {}", url);

        let response = self.client.post(&url).json(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("Signup failed")
                .to_string();
            return Err(TrackerError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AccountId, ChannelId, EnrollmentForm};
    use chrono::NaiveDate;
    use httpmock::prelude::*;
    use serde_json::json;

    fn token() -> BearerToken {
        BearerToken::new("tok-abc")
    }

    fn detail_payload() -> NewSubscriptionDetail {
        NewSubscriptionDetail {
            subscription_channel_id: ChannelId::new("3"),
            account_id: AccountId::new("11"),
            form: EnrollmentForm::new(
                NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                8.0,
            ),
        }
    }

    #[tokio::test]
    async fn test_create_detail_returns_server_id() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/subscription-details")
                .header("Authorization", "Bearer tok-abc")
                .body_contains("\"subscription_channel_id\":3");
            then.status(201)
                .header("Content-Type", "application/json")
                .json_body(json!({"id": 77}));
        });

        let client = ApiClient::new(server.base_url());
        let id = client.create_detail(&token(), &detail_payload()).await.unwrap();

        api_mock.assert();
        assert_eq!(id, DetailId::new("77"));
    }

    #[tokio::test]
    async fn test_create_detail_conflict_is_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/subscription-details");
            then.status(409).body("duplicate key");
        });

        let client = ApiClient::new(server.base_url());
        let err = client
            .create_detail(&token(), &detail_payload())
            .await
            .unwrap_err();

        assert_eq!(err, WriteError::Conflict);
    }

    #[tokio::test]
    async fn test_other_status_surfaces_raw_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/subscription-events");
            then.status(422).body("{\"error\":\"detail not found\"}");
        });

        let client = ApiClient::new(server.base_url());
        let payload = NewSubscriptionEvent {
            subscription_detail_id: DetailId::new("5"),
            account_id: AccountId::new("11"),
        };
        let err = client.create_event(&token(), &payload).await.unwrap_err();

        assert_eq!(
            err,
            WriteError::Other("{\"error\":\"detail not found\"}".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_error_body_falls_back_to_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/v1/subscription-details/5");
            then.status(500);
        });

        let client = ApiClient::new(server.base_url());
        let err = client
            .delete_detail(&token(), &DetailId::new("5"))
            .await
            .unwrap_err();

        assert_eq!(err, WriteError::Other("HTTP error! status: 500".to_string()));
    }

    #[tokio::test]
    async fn test_success_without_id_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/subscription-details");
            then.status(200).json_body(json!({"status": "ok"}));
        });

        let client = ApiClient::new(server.base_url());
        let err = client
            .create_detail(&token(), &detail_payload())
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Other(msg) if msg.contains("invalid response")));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_write_error() {
        // 沒有服務監聽的埠
        let client = ApiClient::new("http://127.0.0.1:9");
        let err = client
            .delete_detail(&token(), &DetailId::new("1"))
            .await
            .unwrap_err();

        assert!(matches!(err, WriteError::Other(_)));
    }

    #[tokio::test]
    async fn test_list_channels() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/subscription-channels")
                .header("Authorization", "Bearer tok-abc");
            then.status(200).json_body(json!([
                {"id": "1", "channel_name": "Netflix", "channel_status": "active"},
                {"id": 2, "channel_name": "Spotify", "channel_status": "inactive"}
            ]));
        });

        let client = ApiClient::new(server.base_url());
        let channels = client.list_channels(&token()).await.unwrap();

        api_mock.assert();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[1].id.as_str(), "2");
        assert!(!channels[1].is_active());
    }

    #[tokio::test]
    async fn test_read_failure_reports_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/analysis/monthly-report");
            then.status(401);
        });

        let client = ApiClient::new(server.base_url());
        let err = client.monthly_report(&token()).await.unwrap_err();

        match err {
            TrackerError::ApiError { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "HTTP error! status: 401");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_signup_error_field_is_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/auth/signup");
            then.status(400).json_body(json!({"error": "email already registered"}));
        });

        let client = ApiClient::new(server.base_url());
        let form = SignupForm {
            email: "a@b.c".to_string(),
            password: "secret".to_string(),
            name: "A B".to_string(),
            given_name: "A".to_string(),
            family_name: "B".to_string(),
        };
        let err = client.signup(&form).await.unwrap_err();

        assert_eq!(err.user_friendly_message(), "email already registered");
    }
}
