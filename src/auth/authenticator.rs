use std::fmt;
use std::sync::Arc;

use crate::auth::passwords::PasswordService;
use crate::auth::principal::AuthMember;
use crate::auth::store::{MemberStore, OriginFilter};
use crate::auth::{AuthError, AuthResult};

/// Presented credentials for one authentication decision. Lives only for
/// the duration of that decision; `Debug` never prints the secret.
#[derive(Clone)]
pub struct LoginAttempt {
    pub email: String,
    pub password: String,
}

impl LoginAttempt {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginAttempt")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The credential-based authentication decision. Read-only: never mutates
/// account state, on success or failure.
pub struct Authenticator {
    store: Arc<dyn MemberStore>,
    password_service: Arc<PasswordService>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn MemberStore>, password_service: Arc<PasswordService>) -> Self {
        Self {
            store,
            password_service,
        }
    }

    /// Resolve the attempt into an authenticated member, or one of the
    /// decision failures (`MissingIdentity`, `AccountNotFound`,
    /// `BadCredential`). Social accounts are not eligible for password
    /// login and resolve to `AccountNotFound`.
    pub async fn authenticate(&self, attempt: &LoginAttempt) -> AuthResult<AuthMember> {
        if attempt.email.trim().is_empty() {
            return Err(AuthError::MissingIdentity);
        }

        let record = self
            .store
            .find_by_email(&attempt.email, OriginFilter::Local)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let verified = self
            .password_service
            .verify_password(&attempt.password, &record.password_hash)?;
        if !verified {
            log::debug!("credential mismatch for {}", attempt.email);
            return Err(AuthError::BadCredential);
        }

        Ok(AuthMember::from_record(record))
    }
}
