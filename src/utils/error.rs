use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API returned an error: {message}")]
    ApiError { status: u16, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Not logged in: {reason}")]
    SessionError { reason: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Remote,
    Storage,
    Configuration,
    Session,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TrackerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TrackerError::HttpError(_) => ErrorCategory::Network,
            TrackerError::ApiError { .. } => ErrorCategory::Remote,
            TrackerError::IoError(_) | TrackerError::SerializationError(_) => {
                ErrorCategory::Storage
            }
            TrackerError::ConfigError { .. }
            | TrackerError::ConfigValidationError { .. }
            | TrackerError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            TrackerError::SessionError { .. } => ErrorCategory::Session,
            TrackerError::ValidationError { .. } => ErrorCategory::Input,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Remote | ErrorCategory::Session | ErrorCategory::Input => {
                ErrorSeverity::High
            }
            ErrorCategory::Storage | ErrorCategory::Configuration => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            TrackerError::HttpError(e) if e.is_timeout() => {
                "The subscription service did not answer in time".to_string()
            }
            TrackerError::HttpError(_) => "Could not reach the subscription service".to_string(),
            TrackerError::ApiError { message, .. } => message.clone(),
            TrackerError::SessionError { .. } => "You need to log in first".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the API URL and your network connection, then retry",
            ErrorCategory::Remote => "Check the request values or try again later",
            ErrorCategory::Storage => "Check that the session directory is readable and writable",
            ErrorCategory::Configuration => "Fix the configuration file or command-line flags",
            ErrorCategory::Session => "Run `subscritrack login --redirect-url <url>` to sign in",
            ErrorCategory::Input => "Correct the highlighted input and run the command again",
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_maps_to_login_hint() {
        let err = TrackerError::SessionError {
            reason: "no stored token".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Session);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.user_friendly_message(), "You need to log in first");
        assert!(err.recovery_suggestion().contains("login"));
    }

    #[test]
    fn test_api_error_surfaces_server_message() {
        let err = TrackerError::ApiError {
            status: 500,
            message: "HTTP error! status: 500".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Remote);
        assert_eq!(err.user_friendly_message(), "HTTP error! status: 500");
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = TrackerError::InvalidConfigValueError {
            field: "api.base_url".to_string(),
            value: "invalid-url".to_string(),
            reason: "URL must use http or https".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
