use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 伺服器端的識別碼可能是數字或字串，統一以字串保存。
/// 送出時若全為數字則寫成 JSON number。
macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self.0.parse::<i64>() {
                    Ok(n) if n.to_string() == self.0 => serializer.serialize_i64(n),
                    _ => serializer.serialize_str(&self.0),
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

opaque_id!(ChannelId);
opaque_id!(AccountId);
opaque_id!(DetailId);
opaque_id!(EventId);

/// Bearer token；Debug 輸出不洩漏內容
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: AccountId,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub channel_name: String,
    #[serde(default)]
    pub channel_url: String,
    #[serde(default)]
    pub channel_type: String,
    #[serde(default)]
    pub channel_status: String,
    #[serde(default)]
    pub channel_description: String,
    #[serde(default)]
    pub channel_image_url: String,
    #[serde(default)]
    pub channel_created_at: String,
    #[serde(default)]
    pub channel_updated_at: String,
}

impl Channel {
    pub fn is_active(&self) -> bool {
        self.channel_status.eq_ignore_ascii_case("active")
    }
}

/// 訂閱表單，對應頻道視窗中的欄位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentForm {
    pub start_date: NaiveDate,
    #[serde(with = "hh_mm", default)]
    pub start_time: Option<NaiveTime>,
    pub due_date: NaiveDate,
    #[serde(with = "hh_mm", default)]
    pub due_time: Option<NaiveTime>,
    pub monthly_bill: f64,
    #[serde(default)]
    pub reminder_date: Option<NaiveDate>,
    #[serde(with = "hh_mm", default)]
    pub reminder_time: Option<NaiveTime>,
}

impl EnrollmentForm {
    pub fn new(start_date: NaiveDate, due_date: NaiveDate, monthly_bill: f64) -> Self {
        Self {
            start_date,
            start_time: None,
            due_date,
            due_time: None,
            monthly_bill,
            reminder_date: None,
            reminder_time: None,
        }
    }

    pub fn with_times(mut self, start: Option<NaiveTime>, due: Option<NaiveTime>) -> Self {
        self.start_time = start;
        self.due_time = due;
        self
    }

    pub fn with_reminder(mut self, date: Option<NaiveDate>, time: Option<NaiveTime>) -> Self {
        self.reminder_date = date;
        self.reminder_time = time;
        self
    }
}

/// 第一步：建立 subscription detail 的請求內容
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscriptionDetail {
    pub subscription_channel_id: ChannelId,
    pub account_id: AccountId,
    #[serde(flatten)]
    pub form: EnrollmentForm,
}

/// 第二步：建立 subscription event 的請求內容
#[derive(Debug, Clone, Serialize)]
pub struct NewSubscriptionEvent {
    pub subscription_detail_id: DetailId,
    pub account_id: AccountId,
}

/// 建立成功時伺服器回傳的 `{ "id": ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedRecord<Id> {
    pub id: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DueType {
    Monthly,
    Weekly,
    Daily,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: DetailId,
    pub account_id: AccountId,
    pub subscription_channel_id: ChannelId,
    pub subscription_channel_name: String,
    #[serde(default)]
    pub channel_image_url: String,
    #[serde(deserialize_with = "lenient::datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(deserialize_with = "lenient::datetime")]
    pub next_due_date: DateTime<Utc>,
    pub due_type: DueType,
    pub status: String,
    pub monthly_bill: f64,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub reminder_date: Option<DateTime<Utc>>,
    #[serde(with = "hh_mm", default)]
    pub reminder_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReportEntry {
    pub month: String,
    pub year: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySubscription {
    pub month: String,
    pub year: String,
    pub subscription_channel_id: ChannelId,
    pub cost: f64,
    pub status: String,
    pub next_due_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthToMonthReport {
    pub subscriptions: Vec<MonthlySubscription>,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub name: String,
    pub given_name: String,
    pub family_name: String,
}

/// HTML time input 的 `HH:MM` 格式
mod hh_mm {
    use chrono::{DateTime, NaiveTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveTime::parse_from_str(text, FORMAT)
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
                .or_else(|_| {
                    DateTime::parse_from_rfc3339(text).map(|dt| dt.naive_utc().time())
                })
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// 伺服器回傳的日期可能是 RFC3339、無時區的日期時間或只有 `YYYY-MM-DD`（視為 UTC 午夜）
mod lenient {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn datetime<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(raw.trim())
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date: {}", raw)))
    }

    pub fn optional_datetime<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse(text)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date: {}", text))),
        }
    }
}
