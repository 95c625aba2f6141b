//! Request-interception pipeline.
//!
//! The chain is a statically ordered list of [`RequestFilter`]s composed at
//! startup: the token guard runs first, then the API login endpoint, both
//! strictly ahead of Rocket's route dispatch so API traffic never falls
//! through to the browser-oriented handling. Each filter either forwards to
//! the next stage or terminates the request with a fully shaped response.
//!
//! A fairing adapter re-enters the chain for every request. Terminations are
//! realized by rewriting the request to an internal terminal route that
//! writes the stashed response; forwards may thread the resolved identity to
//! downstream handlers through the request-local cache.

use std::sync::Arc;

use rocket::data::Data;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::form::Form;
use rocket::http::Method;
use rocket::http::uri::Origin;
use rocket::Request;

use crate::auth::authenticator::{Authenticator, LoginAttempt};
use crate::auth::handlers::TerminalResponse;
use crate::auth::jwt::JwtService;
use crate::auth::{AuthError, AuthResult, AuthState};

/// Internal route that renders a stashed terminal response.
pub const TERMINAL_URI: &str = "/__auth/terminal";

/// Login form bodies are tiny; peeking this much is always enough.
const FORM_PEEK_BYTES: usize = 512;

/// The slice of an incoming request the chain inspects. Owned so the chain
/// stays independent of Rocket's request lifetimes and trivially testable.
/// No `Debug`: the form body may carry a plaintext secret.
#[derive(Clone)]
pub struct FilterRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub form_body: Option<String>,
}

/// Decision of a single filter stage.
pub enum FilterOutcome {
    /// Continue to the next stage, optionally attaching a resolved identity.
    Forward(Option<String>),
    /// Stop the chain; the response is final.
    Terminate(TerminalResponse),
}

/// Decision of the whole chain for one request.
pub enum ChainOutcome {
    Forward { resolved: Option<String> },
    Terminate(TerminalResponse),
}

#[rocket::async_trait]
pub trait RequestFilter: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn apply(&self, request: &FilterRequest) -> FilterOutcome;
}

/// Ant-style path pattern: `*` matches one segment, `**` any number
/// (including none).
#[derive(Debug, Clone)]
pub struct PathMatcher {
    segments: Vec<MatchSegment>,
}

#[derive(Debug, Clone)]
enum MatchSegment {
    Literal(String),
    AnyOne,
    AnyTail,
}

impl PathMatcher {
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => MatchSegment::AnyOne,
                "**" => MatchSegment::AnyTail,
                literal => MatchSegment::Literal(literal.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        matches_from(&self.segments, &parts)
    }
}

fn matches_from(pattern: &[MatchSegment], parts: &[&str]) -> bool {
    match pattern.split_first() {
        None => parts.is_empty(),
        Some((MatchSegment::AnyTail, rest)) => {
            (0..=parts.len()).any(|skip| matches_from(rest, &parts[skip..]))
        }
        Some((MatchSegment::AnyOne, rest)) => {
            !parts.is_empty() && matches_from(rest, &parts[1..])
        }
        Some((MatchSegment::Literal(lit), rest)) => {
            parts.first() == Some(&lit.as_str()) && matches_from(rest, &parts[1..])
        }
    }
}

/// Token-guard stage: requests under the protected pattern must carry a
/// valid bearer token. Fails closed with one opaque 403 body; on success the
/// verified subject is threaded forward.
pub struct ApiCheckFilter {
    matcher: PathMatcher,
    jwt_service: Arc<JwtService>,
}

impl ApiCheckFilter {
    pub fn new(matcher: PathMatcher, jwt_service: Arc<JwtService>) -> Self {
        Self {
            matcher,
            jwt_service,
        }
    }

    fn check_auth_header(&self, request: &FilterRequest) -> AuthResult<String> {
        let header = request
            .authorization
            .as_deref()
            .ok_or(AuthError::TokenInvalid)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::TokenInvalid)?;
        let subject = self.jwt_service.validate_and_extract(token)?;
        if subject.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        Ok(subject)
    }
}

#[rocket::async_trait]
impl RequestFilter for ApiCheckFilter {
    fn name(&self) -> &'static str {
        "api-check"
    }

    async fn apply(&self, request: &FilterRequest) -> FilterOutcome {
        if !self.matcher.matches(&request.path) {
            return FilterOutcome::Forward(None);
        }

        match self.check_auth_header(request) {
            Ok(subject) => {
                log::debug!("api token verified for {subject}");
                FilterOutcome::Forward(Some(subject))
            }
            Err(err) => {
                log::info!("api token check failed on {}: {err}", request.path);
                FilterOutcome::Terminate(TerminalResponse::token_check_failure())
            }
        }
    }
}

#[derive(rocket::form::FromForm)]
struct ApiLoginForm {
    email: Option<String>,
    pw: Option<String>,
}

/// Login-submission stage: drives the credential decision on the API login
/// path and answers with either the raw token or the structured failure
/// body. No session or cookie is established here.
pub struct ApiLoginFilter {
    login_path: String,
    authenticator: Authenticator,
    jwt_service: Arc<JwtService>,
}

impl ApiLoginFilter {
    pub fn new(login_path: String, authenticator: Authenticator, jwt_service: Arc<JwtService>) -> Self {
        Self {
            login_path,
            authenticator,
            jwt_service,
        }
    }

    fn attempt_from(&self, request: &FilterRequest) -> LoginAttempt {
        let parsed: ApiLoginForm = request
            .form_body
            .as_deref()
            .and_then(|body| Form::parse(body).ok())
            .unwrap_or(ApiLoginForm {
                email: None,
                pw: None,
            });

        LoginAttempt::new(
            parsed.email.unwrap_or_default(),
            parsed.pw.unwrap_or_default(),
        )
    }
}

#[rocket::async_trait]
impl RequestFilter for ApiLoginFilter {
    fn name(&self) -> &'static str {
        "api-login"
    }

    async fn apply(&self, request: &FilterRequest) -> FilterOutcome {
        if request.method != Method::Post || request.path != self.login_path {
            return FilterOutcome::Forward(None);
        }

        let attempt = self.attempt_from(request);
        match self.authenticator.authenticate(&attempt).await {
            Ok(member) => match self.jwt_service.issue(member.email()) {
                Ok(signed) => {
                    log::info!("api login succeeded for {}", member.email());
                    FilterOutcome::Terminate(TerminalResponse::token_body(signed.token))
                }
                Err(err) => {
                    log::error!("token issuance failed for {}: {err}", member.email());
                    FilterOutcome::Terminate(TerminalResponse::internal_failure())
                }
            },
            Err(err) => {
                log::info!("api login failed for '{}': {err}", attempt.email);
                if err.status().code >= 500 {
                    FilterOutcome::Terminate(TerminalResponse::internal_failure())
                } else {
                    FilterOutcome::Terminate(TerminalResponse::login_failure(&err))
                }
            }
        }
    }
}

/// The composed chain. Stage order is fixed when the service ignites and
/// never changes afterward.
pub struct AuthFilterChain {
    filters: Vec<Box<dyn RequestFilter>>,
    login_path: String,
}

impl AuthFilterChain {
    pub fn new(state: &AuthState) -> Self {
        let filters: Vec<Box<dyn RequestFilter>> = vec![
            Box::new(ApiCheckFilter::new(
                PathMatcher::new(&state.config.protected_pattern),
                state.jwt_service.clone(),
            )),
            Box::new(ApiLoginFilter::new(
                state.config.api_login_path.clone(),
                Authenticator::new(state.member_store.clone(), state.password_service.clone()),
                state.jwt_service.clone(),
            )),
        ];

        Self {
            filters,
            login_path: state.config.api_login_path.clone(),
        }
    }

    pub async fn run(&self, request: &FilterRequest) -> ChainOutcome {
        let mut resolved = None;
        for filter in &self.filters {
            match filter.apply(request).await {
                FilterOutcome::Forward(identity) => {
                    if identity.is_some() {
                        resolved = identity;
                    }
                }
                FilterOutcome::Terminate(response) => {
                    log::debug!(
                        "filter '{}' terminated {} {}",
                        filter.name(),
                        request.method,
                        request.path
                    );
                    return ChainOutcome::Terminate(response);
                }
            }
        }
        ChainOutcome::Forward { resolved }
    }

    /// Whether the fairing needs to peek the request body before running the
    /// chain.
    pub fn wants_form_body(&self, method: Method, path: &str) -> bool {
        method == Method::Post && path == self.login_path
    }
}

/// Identity the token guard resolved for this request, if any. Downstream
/// guards read this instead of re-deriving it from the header.
#[derive(Debug, Default, Clone)]
pub struct ResolvedIdentity(pub Option<String>);

/// Terminal response stashed for the internal terminal route.
#[derive(Debug, Default, Clone)]
pub struct PendingTerminal(pub Option<TerminalResponse>);

/// Fairing adapter: runs the chain before route dispatch and rewrites
/// terminating requests to the terminal route.
pub struct AuthFilters;

#[rocket::async_trait]
impl Fairing for AuthFilters {
    fn info(&self) -> Info {
        Info {
            name: "Auth Filter Chain",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, data: &mut Data<'_>) {
        let outcome = {
            let Some(chain) = req.rocket().state::<AuthFilterChain>() else {
                log::error!("auth filter chain missing from managed state");
                return;
            };

            let path = req.uri().path().as_str().to_string();
            let form_body = if chain.wants_form_body(req.method(), &path)
                && req.content_type().is_some_and(|ct| ct.is_form())
            {
                let peeked = data.peek(FORM_PEEK_BYTES).await;
                Some(String::from_utf8_lossy(peeked).into_owned())
            } else {
                None
            };

            let filter_request = FilterRequest {
                method: req.method(),
                authorization: req.headers().get_one("Authorization").map(str::to_string),
                path,
                form_body,
            };

            chain.run(&filter_request).await
        };

        match outcome {
            ChainOutcome::Forward { resolved } => {
                req.local_cache(|| ResolvedIdentity(resolved));
            }
            ChainOutcome::Terminate(response) => {
                req.local_cache(|| PendingTerminal(Some(response)));
                req.set_method(Method::Get);
                req.set_uri(Origin::parse(TERMINAL_URI).expect("static terminal uri"));
            }
        }
    }
}
