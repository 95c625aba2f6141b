//! Browser-facing auth routes: form login/logout, the Google social flow,
//! and the internal sink for responses the filter chain already decided.

use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::response::Redirect;
use rocket::{Request, State, get, post};
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::openapi;
use time::Duration as TimeDuration;

use crate::auth::authenticator::{Authenticator, LoginAttempt};
use crate::auth::filters::PendingTerminal;
use crate::auth::handlers::TerminalResponse;
use crate::auth::social::GOOGLE_PROVIDER;
use crate::auth::{AuthResult, AuthState};

#[derive(rocket::form::FromForm)]
pub struct LoginForm {
    pub email: Option<String>,
    pub pw: Option<String>,
}

/// Browser login: runs the credential decision, establishes the session
/// cookie, and applies the success policy's redirect decision.
#[openapi(skip)]
#[post("/login", data = "<form>")]
pub async fn form_login(
    state: &State<AuthState>,
    cookies: &CookieJar<'_>,
    form: Form<LoginForm>,
) -> Result<Redirect, TerminalResponse> {
    let form = form.into_inner();
    let attempt = LoginAttempt::new(form.email.unwrap_or_default(), form.pw.unwrap_or_default());

    let authenticator =
        Authenticator::new(state.member_store.clone(), state.password_service.clone());
    let member = match authenticator.authenticate(&attempt).await {
        Ok(member) => member,
        Err(err) => {
            log::info!("form login failed for '{}': {err}", attempt.email);
            return Err(TerminalResponse::login_failure(&err));
        }
    };

    establish_session(state, cookies, member.email()).map_err(|err| {
        log::error!("session establishment failed: {err}");
        TerminalResponse::internal_failure()
    })?;

    let target = state.success_policy.redirect_target(&member).map_err(|err| {
        log::error!("success policy failed: {err}");
        TerminalResponse::internal_failure()
    })?;

    Ok(Redirect::to(target.unwrap_or("/")))
}

#[openapi(tag = "Auth")]
#[get("/logout")]
pub fn logout(state: &State<AuthState>, cookies: &CookieJar<'_>) -> Redirect {
    let cookie = Cookie::build((state.config.session_cookie_name.clone(), String::new()))
        .path("/")
        .removal()
        .build();
    cookies.add(cookie);
    Redirect::to("/")
}

/// Kick off the Google authorization-code flow.
#[openapi(tag = "Auth")]
#[get("/auth/google")]
pub async fn google_authorize(
    state: &State<AuthState>,
    pool: &State<PgPool>,
) -> Result<Redirect, TerminalResponse> {
    let Some(google) = &state.google else {
        return Err(social_unavailable());
    };

    match google.begin_login(pool).await {
        Ok(url) => Ok(Redirect::to(url)),
        Err(err) => {
            log::error!("google authorize failed: {err}");
            Err(TerminalResponse::internal_failure())
        }
    }
}

/// Provider callback: completes the handshake, resolves the principal,
/// establishes the session, and applies the success redirect decision.
#[openapi(tag = "Auth")]
#[get("/auth/google/callback?<code>&<state>")]
pub async fn google_callback(
    auth_state: &State<AuthState>,
    pool: &State<PgPool>,
    cookies: &CookieJar<'_>,
    code: String,
    state: String,
) -> Result<Redirect, TerminalResponse> {
    let Some(google) = &auth_state.google else {
        return Err(social_unavailable());
    };

    let attributes = match google.finish_login(pool, &code, &state).await {
        Ok(attributes) => attributes,
        Err(err) => {
            log::info!("google handshake failed: {err}");
            return Err(TerminalResponse::login_failure(&err));
        }
    };

    let member = match auth_state
        .social_resolver
        .resolve(GOOGLE_PROVIDER, attributes)
        .await
    {
        Ok(member) => member,
        Err(err) => {
            log::info!("social principal resolution failed: {err}");
            return Err(TerminalResponse::login_failure(&err));
        }
    };

    establish_session(auth_state, cookies, member.email()).map_err(|err| {
        log::error!("session establishment failed: {err}");
        TerminalResponse::internal_failure()
    })?;

    let target = auth_state
        .success_policy
        .redirect_target(&member)
        .map_err(|err| {
            log::error!("success policy failed: {err}");
            TerminalResponse::internal_failure()
        })?;

    Ok(Redirect::to(target.unwrap_or("/")))
}

/// The session "state" is nothing but a signed token in a cookie; there is
/// no server-side session record to create or destroy.
fn establish_session(state: &AuthState, cookies: &CookieJar<'_>, subject: &str) -> AuthResult<()> {
    let signed = state.jwt_service.issue(subject)?;
    let cookie = Cookie::build((state.config.session_cookie_name.clone(), signed.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(TimeDuration::seconds(state.config.token_ttl_secs))
        .build();
    cookies.add(cookie);
    Ok(())
}

fn social_unavailable() -> TerminalResponse {
    TerminalResponse {
        status: Status::ServiceUnavailable,
        content_type: "application/json; charset=utf-8",
        body: serde_json::json!({
            "code": "503",
            "message": "social login not configured",
        })
        .to_string(),
    }
}

/// Guard carrying the response a filter stashed before rewriting the
/// request here.
pub struct ChainTerminal(pub TerminalResponse);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ChainTerminal {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pending = request.local_cache(PendingTerminal::default);
        match &pending.0 {
            Some(response) => Outcome::Success(ChainTerminal(response.clone())),
            // Direct hits on the internal path fall through to a 404.
            None => Outcome::Forward(Status::NotFound),
        }
    }
}

#[get("/terminal")]
pub fn chain_terminal(pending: ChainTerminal) -> TerminalResponse {
    pending.0
}
