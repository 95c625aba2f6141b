use std::io::Cursor;
use std::sync::Arc;

use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};

use crate::auth::passwords::PasswordService;
use crate::auth::principal::AuthMember;
use crate::auth::{AuthError, AuthResult};

/// Where a freshly signed-in social member is nudged to finish account
/// setup.
pub const MODIFY_REDIRECT: &str = "/member/modify?from=social";

/// A fully shaped terminal response written by the filter chain or a login
/// handler; nothing downstream runs once one of these is produced.
#[derive(Debug, Clone)]
pub struct TerminalResponse {
    pub status: Status,
    pub content_type: &'static str,
    pub body: String,
}

impl TerminalResponse {
    /// API login success: the raw token is the entire body.
    pub fn token_body(token: String) -> Self {
        Self {
            status: Status::Ok,
            content_type: "text/plain",
            body: token,
        }
    }

    /// Any authentication-decision failure. The reason is surfaced verbatim;
    /// the status line never distinguishes which half of the credential pair
    /// was wrong.
    pub fn login_failure(err: &AuthError) -> Self {
        Self {
            status: Status::Unauthorized,
            content_type: "application/json; charset=utf-8",
            body: serde_json::json!({
                "code": "401",
                "message": err.to_string(),
            })
            .to_string(),
        }
    }

    /// Infrastructure failure while deciding a login; reveals nothing about
    /// the credentials.
    pub fn internal_failure() -> Self {
        Self {
            status: Status::InternalServerError,
            content_type: "application/json; charset=utf-8",
            body: serde_json::json!({
                "code": "500",
                "message": "authentication unavailable",
            })
            .to_string(),
        }
    }

    /// Any token-validation failure on a protected path. One opaque message
    /// for the whole family.
    pub fn token_check_failure() -> Self {
        Self {
            status: Status::Forbidden,
            content_type: "application/json;charset=utf-8",
            body: serde_json::json!({
                "code": "403",
                "message": "FAIL CHECK API TOKEN",
            })
            .to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for TerminalResponse {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .status(self.status)
            .raw_header("Content-Type", self.content_type)
            .sized_body(self.body.len(), Cursor::new(self.body))
            .ok()
    }
}

impl rocket_okapi::response::OpenApiResponderInner for TerminalResponse {
    fn responses(
        _generator: &mut rocket_okapi::r#gen::OpenApiGenerator,
    ) -> rocket_okapi::Result<okapi::openapi3::Responses> {
        Ok(okapi::openapi3::Responses::default())
    }
}

/// Post-login success policy for the browser and social flows: members who
/// arrived through a social provider and still carry the placeholder
/// credential get redirected to the account-completion page.
pub struct LoginSuccessPolicy {
    password_service: Arc<PasswordService>,
    placeholder_password: String,
}

impl LoginSuccessPolicy {
    pub fn new(password_service: Arc<PasswordService>, placeholder_password: String) -> Self {
        Self {
            password_service,
            placeholder_password,
        }
    }

    /// `Some(target)` when the member should be redirected instead of
    /// proceeding to the originally requested resource.
    pub fn redirect_target(&self, member: &AuthMember) -> AuthResult<Option<&'static str>> {
        if !member.from_social() {
            return Ok(None);
        }
        let still_placeholder = self
            .password_service
            .verify_password(&self.placeholder_password, member.password_hash())?;
        Ok(still_placeholder.then_some(MODIFY_REDIRECT))
    }
}
