use crate::domain::model::{AccountId, BearerToken, User};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, TrackerError};
use url::Url;

pub const TOKEN_KEY: &str = "auth_token";
pub const USER_KEY: &str = "auth_user";

/// 以值傳遞的 session，coordinator 只讀不寫
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    token: Option<BearerToken>,
    user: Option<User>,
}

impl SessionContext {
    pub fn new(token: Option<BearerToken>, user: Option<User>) -> Self {
        Self { token, user }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<&BearerToken> {
        self.token.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn account_id(&self) -> Option<&AccountId> {
        self.user.as_ref().map(|u| &u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// 需要登入的指令使用
    pub fn require_token(&self) -> Result<&BearerToken> {
        self.token.as_ref().ok_or_else(|| TrackerError::SessionError {
            reason: "no bearer token in session".to_string(),
        })
    }
}

/// OAuth 重新導向帶回來的 query 參數
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub token: Option<String>,
    pub user: Option<String>,
    pub error: Option<String>,
}

impl RedirectParams {
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "token" => params.token = Some(value.into_owned()),
                "user" => params.user = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| TrackerError::ValidationError {
            message: format!("invalid redirect URL: {}", e),
        })?;
        Ok(Self::from_url(&url))
    }

    pub fn is_present(&self) -> bool {
        self.token.is_some() || self.user.is_some() || self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionPhase {
    Unresolved,
    ResolvingRedirect,
    Authenticated(SessionContext),
    Unauthenticated { reason: String },
}

impl SessionPhase {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionPhase::Authenticated(_) | SessionPhase::Unauthenticated { .. }
        )
    }

    pub fn context(&self) -> SessionContext {
        match self {
            SessionPhase::Authenticated(ctx) => ctx.clone(),
            _ => SessionContext::anonymous(),
        }
    }
}

/// 依序處理 OAuth 重新導向與已儲存的 session，只有一條路徑會寫入狀態
pub struct SessionResolver<S: Storage> {
    storage: S,
    phase: SessionPhase,
}

impl<S: Storage> SessionResolver<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            phase: SessionPhase::Unresolved,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// 有重新導向參數時優先處理，否則讀取已儲存的 session
    pub async fn resolve(&mut self, redirect: Option<RedirectParams>) -> Result<&SessionPhase> {
        let redirect = redirect.filter(RedirectParams::is_present);

        let resolved = match redirect {
            Some(params) => {
                self.phase = SessionPhase::ResolvingRedirect;
                tracing::debug!("🔑 Resolving OAuth redirect");
                self.resolve_redirect(params).await
            }
            None => self.load_stored().await,
        };

        // 儲存失敗時也要落在已決定的狀態
        match resolved {
            Ok(phase) => self.phase = phase,
            Err(e) => {
                tracing::warn!("🔒 Session could not be resolved: {}", e);
                self.phase = SessionPhase::Unauthenticated {
                    reason: format!("session storage failed: {}", e),
                };
                return Err(e);
            }
        }

        Ok(&self.phase)
    }

    async fn resolve_redirect(&self, params: RedirectParams) -> Result<SessionPhase> {
        if let Some(error) = params.error {
            tracing::warn!("🔒 OAuth redirect returned an error: {}", error);
            return Ok(SessionPhase::Unauthenticated {
                reason: format!("login failed: {}", error),
            });
        }

        let (token, raw_user) = match (params.token, params.user) {
            (Some(token), Some(user)) => (token, user),
            _ => {
                return Ok(SessionPhase::Unauthenticated {
                    reason: "redirect is missing the token or user".to_string(),
                })
            }
        };

        let user: User = match serde_json::from_str(&raw_user) {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("🔒 Could not parse user from redirect: {}", e);
                return Ok(SessionPhase::Unauthenticated {
                    reason: "redirect carried an unreadable user".to_string(),
                });
            }
        };

        self.login(BearerToken::new(token), user).await
    }

    async fn load_stored(&self) -> Result<SessionPhase> {
        let token = self.storage.read_file(TOKEN_KEY).await?;
        let user = self.storage.read_file(USER_KEY).await?;

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            _ => {
                return Ok(SessionPhase::Unauthenticated {
                    reason: "no stored session".to_string(),
                })
            }
        };

        match serde_json::from_slice::<User>(&user) {
            Ok(user) => {
                let token = String::from_utf8_lossy(&token).trim().to_string();
                tracing::debug!("🔑 Loaded stored session for {}", user.email);
                Ok(SessionPhase::Authenticated(SessionContext::new(
                    Some(BearerToken::new(token)),
                    Some(user),
                )))
            }
            Err(e) => {
                tracing::warn!("🔒 Stored user is unreadable, clearing session: {}", e);
                self.clear().await?;
                Ok(SessionPhase::Unauthenticated {
                    reason: "stored session was corrupted".to_string(),
                })
            }
        }
    }

    async fn login(&self, token: BearerToken, user: User) -> Result<SessionPhase> {
        self.storage
            .write_file(TOKEN_KEY, token.expose().as_bytes())
            .await?;
        self.storage
            .write_file(USER_KEY, &serde_json::to_vec(&user)?)
            .await?;
        tracing::info!("🔓 Logged in as {}", user.email);
        Ok(SessionPhase::Authenticated(SessionContext::new(
            Some(token),
            Some(user),
        )))
    }

    pub async fn logout(&mut self) -> Result<()> {
        self.clear().await?;
        self.phase = SessionPhase::Unauthenticated {
            reason: "logged out".to_string(),
        };
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.storage.remove_file(TOKEN_KEY).await?;
        self.storage.remove_file(USER_KEY).await
    }
}
