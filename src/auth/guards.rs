use rocket::Request;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::filters::ResolvedIdentity;
use crate::auth::principal::AuthMember;
use crate::auth::store::OriginFilter;
use crate::auth::{AuthError, AuthResult, AuthState};

/// Principal for API requests that came through the token guard. Reads the
/// identity the filter chain threaded forward; for routes outside the
/// guarded pattern it falls back to deriving the subject from the bearer
/// header itself.
#[derive(Debug, OpenApiFromRequest)]
pub struct ApiUser(pub AuthMember);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ApiUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_api_user(request).await {
            Ok(member) => Outcome::Success(ApiUser(member)),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

/// Principal for browser requests carrying a valid session cookie.
#[derive(Debug, OpenApiFromRequest)]
pub struct SessionUser(pub AuthMember);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session_user(request).await {
            Ok(member) => Outcome::Success(SessionUser(member)),
            Err(err) => Outcome::Error((err.status(), err)),
        }
    }
}

fn auth_state<'r>(request: &'r Request<'_>) -> AuthResult<&'r AuthState> {
    request
        .rocket()
        .state::<AuthState>()
        .ok_or_else(|| AuthError::Config("AuthState missing from managed state".into()))
}

async fn resolve_api_user(request: &Request<'_>) -> AuthResult<AuthMember> {
    let state = auth_state(request)?;

    let resolved = request.local_cache(ResolvedIdentity::default);
    let subject = match &resolved.0 {
        Some(subject) => subject.clone(),
        None => bearer_subject(request, state)?,
    };

    let record = state
        .member_store
        .find_by_email(&subject, OriginFilter::Any)
        .await?
        .ok_or(AuthError::AccountNotFound)?;

    Ok(AuthMember::from_record(record))
}

fn bearer_subject(request: &Request<'_>, state: &AuthState) -> AuthResult<String> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::TokenInvalid)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::TokenInvalid)?;
    state.jwt_service.validate_and_extract(token)
}

async fn resolve_session_user(request: &Request<'_>) -> AuthResult<AuthMember> {
    let state = auth_state(request)?;

    let cookie = request
        .cookies()
        .get(&state.config.session_cookie_name)
        .ok_or(AuthError::Unauthorized)?;

    let subject = state
        .jwt_service
        .validate_and_extract(cookie.value())
        .map_err(|err| {
            log::debug!("session cookie rejected: {err}");
            AuthError::Unauthorized
        })?;

    let record = state
        .member_store
        .find_by_email(&subject, OriginFilter::Any)
        .await?
        .ok_or(AuthError::Unauthorized)?;

    Ok(AuthMember::from_record(record))
}
