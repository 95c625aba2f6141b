use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables.
///
/// The signing secret is read once at startup and never changes for the
/// lifetime of the process; everything that needs it receives it from here.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    pub protected_pattern: String,
    pub api_login_path: String,
    pub session_cookie_name: String,
    pub cookie_secure: bool,
    pub social_placeholder_password: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_url: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let jwt_secret = std::env::var("CLUB_JWT_SECRET")
            .map_err(|_| AuthError::Config("CLUB_JWT_SECRET is required".into()))?;
        let token_ttl_secs = std::env::var("CLUB_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(7 * 24 * 60 * 60);
        let protected_pattern =
            std::env::var("CLUB_PROTECTED_PATTERN").unwrap_or_else(|_| "/notes/**".into());
        let api_login_path =
            std::env::var("CLUB_API_LOGIN_PATH").unwrap_or_else(|_| "/api/login".into());
        let session_cookie_name =
            std::env::var("CLUB_SESSION_COOKIE_NAME").unwrap_or_else(|_| "club_session".into());
        let cookie_secure = std::env::var("CLUB_COOKIE_SECURE")
            .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
            .unwrap_or(true);
        let social_placeholder_password =
            std::env::var("CLUB_SOCIAL_PLACEHOLDER_PW").unwrap_or_else(|_| "1111".into());
        let google_client_id = std::env::var("CLUB_GOOGLE_CLIENT_ID").ok();
        let google_client_secret = std::env::var("CLUB_GOOGLE_CLIENT_SECRET").ok();
        let google_redirect_url = std::env::var("CLUB_GOOGLE_REDIRECT_URL").ok();

        Ok(Self {
            jwt_secret,
            token_ttl_secs,
            protected_pattern,
            api_login_path,
            session_cookie_name,
            cookie_secure,
            social_placeholder_password,
            google_client_id,
            google_client_secret,
            google_redirect_url,
        })
    }
}
