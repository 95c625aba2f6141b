use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failure kinds of the authentication pipeline.
///
/// Token-validation kinds and authentication-decision kinds stay separate
/// here so logging can tell them apart; the HTTP boundary collapses each
/// family into a single response shape (see `handlers`).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token")]
    MalformedToken,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("email cannot be null")]
    MissingIdentity,
    #[error("Check Email or Social")]
    AccountNotFound,
    #[error("Bad credentials")]
    BadCredential,
    #[error("unsupported social provider: {0}")]
    UnsupportedProvider(String),
    #[error("invalid or expired oauth state")]
    OAuthStateInvalid,
    #[error("unauthorized")]
    Unauthorized,
    #[error("oauth exchange failed: {0}")]
    OAuthExchange(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::MalformedToken | AuthError::TokenExpired | AuthError::TokenInvalid => {
                Status::Forbidden
            }
            AuthError::MissingIdentity
            | AuthError::AccountNotFound
            | AuthError::BadCredential
            | AuthError::UnsupportedProvider(_)
            | AuthError::OAuthStateInvalid
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::OAuthExchange(_) => Status::BadGateway,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Other(_) => Status::InternalServerError,
        }
    }

    /// True for the token-validation family handled by the API check filter.
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken | AuthError::TokenExpired | AuthError::TokenInvalid
        )
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}
