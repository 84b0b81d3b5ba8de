use crate::domain::model::{
    BearerToken, Channel, DetailId, EventId, MonthToMonthReport, MonthlyReportEntry,
    NewSubscriptionDetail, NewSubscriptionEvent, SignupForm, UserSubscription,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 遠端寫入失敗的分類；409 另外區分，其餘保留原始回應內容
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("a record with the same key already exists")]
    Conflict,

    #[error("{0}")]
    Other(String),
}

/// 訂閱流程需要的三個遠端寫入操作。不重試、不保存狀態。
#[async_trait]
pub trait RemoteWriteClient: Send + Sync {
    async fn create_detail(
        &self,
        token: &BearerToken,
        payload: &NewSubscriptionDetail,
    ) -> std::result::Result<DetailId, WriteError>;

    async fn create_event(
        &self,
        token: &BearerToken,
        payload: &NewSubscriptionEvent,
    ) -> std::result::Result<EventId, WriteError>;

    async fn delete_detail(
        &self,
        token: &BearerToken,
        id: &DetailId,
    ) -> std::result::Result<(), WriteError>;
}

/// 唯讀查詢與註冊
#[async_trait]
pub trait TrackerApi: Send + Sync {
    async fn list_channels(&self, token: &BearerToken) -> Result<Vec<Channel>>;
    async fn list_subscriptions(&self, token: &BearerToken) -> Result<Vec<UserSubscription>>;
    async fn monthly_report(&self, token: &BearerToken) -> Result<Vec<MonthlyReportEntry>>;
    async fn month_to_month_report(&self, token: &BearerToken) -> Result<MonthToMonthReport>;
    async fn signup(&self, form: &SignupForm) -> Result<serde_json::Value>;
}

/// 本機鍵值儲存（取代瀏覽器的 localStorage）
pub trait Storage: Send + Sync {
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn request_timeout(&self) -> Option<Duration>;
    fn session_dir(&self) -> &str;
}
