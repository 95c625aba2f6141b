//! Authentication pipeline: configuration, credential handling, token
//! minting, the request filter chain, social login, and request guards.

use std::sync::Arc;

pub mod authenticator;
pub mod config;
pub mod error;
pub mod filters;
pub mod guards;
pub mod handlers;
pub mod jwt;
pub mod passwords;
pub mod principal;
pub mod routes;
pub mod social;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use filters::{AuthFilterChain, AuthFilters};
pub use guards::{ApiUser, SessionUser};
pub use jwt::JwtService;
pub use passwords::PasswordService;

use handlers::LoginSuccessPolicy;
use social::{GoogleOAuth, SocialLoginResolver};
use store::MemberStore;

/// Process-wide authentication state, assembled once at ignition and
/// read-only afterward.
pub struct AuthState {
    pub config: AuthConfig,
    pub password_service: Arc<PasswordService>,
    pub jwt_service: Arc<JwtService>,
    pub member_store: Arc<dyn MemberStore>,
    pub social_resolver: Arc<SocialLoginResolver>,
    pub success_policy: Arc<LoginSuccessPolicy>,
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        password_service: PasswordService,
        member_store: Arc<dyn MemberStore>,
    ) -> AuthResult<Self> {
        let password_service = Arc::new(password_service);
        let jwt_service = Arc::new(JwtService::from_config(&config));

        // Every social account starts with the same placeholder credential;
        // hash it once here rather than per login.
        let placeholder_hash =
            password_service.hash_password(&config.social_placeholder_password)?;
        let social_resolver = Arc::new(SocialLoginResolver::new(
            member_store.clone(),
            placeholder_hash,
        ));
        let success_policy = Arc::new(LoginSuccessPolicy::new(
            password_service.clone(),
            config.social_placeholder_password.clone(),
        ));
        let google = GoogleOAuth::from_config(&config)?.map(Arc::new);

        Ok(Self {
            config,
            password_service,
            jwt_service,
            member_store,
            social_resolver,
            success_policy,
            google,
        })
    }
}
