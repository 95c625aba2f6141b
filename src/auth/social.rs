//! Social (OAuth2) login: provider identity extraction, the find-or-create
//! resolution into a principal, and the Google authorization-code flow with
//! PKCE. Repeat logins reuse the stored account as-is; provider attributes
//! are never merged back into it.

use std::sync::Arc;

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use rocket_db_pools::sqlx::{self, PgPool};
use serde_json::{Map, Value};

use crate::auth::principal::AuthMember;
use crate::auth::store::MemberStore;
use crate::auth::{AuthConfig, AuthError, AuthResult};

pub const GOOGLE_PROVIDER: &str = "Google";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Providers this deployment can complete a login against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialProvider {
    Google,
}

impl SocialProvider {
    pub fn from_name(name: &str) -> AuthResult<Self> {
        match name {
            GOOGLE_PROVIDER => Ok(SocialProvider::Google),
            other => Err(AuthError::UnsupportedProvider(other.to_string())),
        }
    }

    /// Pull the canonical identity out of the provider's user-info document.
    pub fn extract_identity(&self, attributes: &Map<String, Value>) -> AuthResult<String> {
        match self {
            SocialProvider::Google => attributes
                .get("email")
                .and_then(Value::as_str)
                .filter(|email| !email.is_empty())
                .map(str::to_string)
                .ok_or(AuthError::MissingIdentity),
        }
    }
}

/// Turns a completed provider handshake into a session principal, creating
/// the backing account on first login.
pub struct SocialLoginResolver {
    store: Arc<dyn MemberStore>,
    placeholder_hash: String,
}

impl SocialLoginResolver {
    /// `placeholder_hash` is the hashed fixed placeholder credential every
    /// freshly created social account starts with.
    pub fn new(store: Arc<dyn MemberStore>, placeholder_hash: String) -> Self {
        Self {
            store,
            placeholder_hash,
        }
    }

    pub async fn resolve(
        &self,
        provider_name: &str,
        attributes: Map<String, Value>,
    ) -> AuthResult<AuthMember> {
        let provider = SocialProvider::from_name(provider_name)?;
        let email = provider.extract_identity(&attributes)?;

        let record = self
            .store
            .find_or_create_social(&email, &self.placeholder_hash)
            .await?;

        log::info!("social login resolved for {email} via {provider_name}");
        Ok(AuthMember::from_social_record(record, attributes))
    }
}

type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google authorization-code client. Handshake state (CSRF state + PKCE
/// verifier) is persisted in `oauth_states` with a short expiry and consumed
/// atomically by the callback.
pub struct GoogleOAuth {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
}

impl GoogleOAuth {
    /// `Ok(None)` when the deployment has no Google client configured;
    /// partially configured deployments are a startup error.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Option<Self>> {
        match (
            &config.google_client_id,
            &config.google_client_secret,
            &config.google_redirect_url,
        ) {
            (Some(id), Some(secret), Some(redirect)) => Ok(Some(Self {
                client_id: ClientId::new(id.clone()),
                client_secret: ClientSecret::new(secret.clone()),
                auth_url: AuthUrl::new(GOOGLE_AUTH_URL.into())
                    .map_err(|err| AuthError::Config(err.to_string()))?,
                token_url: TokenUrl::new(GOOGLE_TOKEN_URL.into())
                    .map_err(|err| AuthError::Config(err.to_string()))?,
                redirect_url: RedirectUrl::new(redirect.clone())
                    .map_err(|err| AuthError::Config(err.to_string()))?,
            })),
            (None, None, None) => Ok(None),
            _ => Err(AuthError::Config(
                "incomplete Google OAuth configuration".into(),
            )),
        }
    }

    fn client(&self) -> ConfiguredClient {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }

    /// Build the provider authorization URL and persist the handshake state.
    pub async fn begin_login(&self, pool: &PgPool) -> AuthResult<String> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client()
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        sqlx::query(
            "INSERT INTO oauth_states (state, provider, pkce_verifier, expires_at) \
             VALUES ($1, $2, $3, now() + interval '10 minutes')",
        )
        .bind(csrf_state.secret())
        .bind(GOOGLE_PROVIDER)
        .bind(pkce_verifier.secret())
        .execute(pool)
        .await?;

        Ok(auth_url.to_string())
    }

    /// Complete the handshake: consume the stored state, trade the code for
    /// an access token, and fetch the provider's user-info document.
    pub async fn finish_login(
        &self,
        pool: &PgPool,
        code: &str,
        state: &str,
    ) -> AuthResult<Map<String, Value>> {
        let row: Option<(String,)> = sqlx::query_as(
            "DELETE FROM oauth_states \
             WHERE state = $1 AND provider = $2 AND expires_at > now() \
             RETURNING pkce_verifier",
        )
        .bind(state)
        .bind(GOOGLE_PROVIDER)
        .fetch_optional(pool)
        .await?;

        let verifier = row.ok_or(AuthError::OAuthStateInvalid)?.0;

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| AuthError::OAuthExchange(err.to_string()))?;

        let token = self
            .client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(&http_client)
            .await
            .map_err(|err| AuthError::OAuthExchange(err.to_string()))?;

        let attributes: Map<String, Value> = http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .map_err(|err| AuthError::OAuthExchange(err.to_string()))?
            .json()
            .await
            .map_err(|err| AuthError::OAuthExchange(err.to_string()))?;

        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::passwords::PasswordService;
    use crate::auth::principal::MemberRole;
    use crate::auth::store::OriginFilter;
    use crate::test_support::InMemoryMemberStore;

    fn attrs(email: Option<&str>) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(email) = email {
            map.insert("email".into(), email.into());
        }
        map.insert("name".into(), "User One".into());
        map
    }

    fn resolver() -> (SocialLoginResolver, Arc<InMemoryMemberStore>) {
        let password_service = PasswordService::new().expect("password service");
        let placeholder_hash = password_service.hash_password("1111").expect("hash");
        let store = Arc::new(InMemoryMemberStore::default());
        (
            SocialLoginResolver::new(store.clone(), placeholder_hash),
            store,
        )
    }

    #[test]
    fn only_known_providers_resolve() {
        assert!(SocialProvider::from_name("Google").is_ok());
        let err = SocialProvider::from_name("Naver").unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedProvider(_)), "got {err:?}");
    }

    #[test]
    fn google_identity_is_the_email_attribute() {
        let identity = SocialProvider::Google
            .extract_identity(&attrs(Some("user1@club.org")))
            .expect("identity");
        assert_eq!(identity, "user1@club.org");

        let err = SocialProvider::Google
            .extract_identity(&attrs(None))
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingIdentity), "got {err:?}");
    }

    #[tokio::test]
    async fn first_login_creates_the_account_with_defaults() {
        let (resolver, store) = resolver();

        let member = resolver
            .resolve(GOOGLE_PROVIDER, attrs(Some("social@club.org")))
            .await
            .expect("resolved");

        assert_eq!(member.email(), "social@club.org");
        assert!(member.from_social());
        assert!(member.has_role(MemberRole::User));
        assert_eq!(
            member.attributes().get("name").and_then(Value::as_str),
            Some("User One")
        );

        let stored = store
            .find_by_email("social@club.org", OriginFilter::Social)
            .await
            .expect("lookup")
            .expect("account exists");
        assert_eq!(stored.name, "social@club.org");
    }

    #[tokio::test]
    async fn repeat_logins_reuse_the_account_unchanged() {
        let (resolver, store) = resolver();

        resolver
            .resolve(GOOGLE_PROVIDER, attrs(Some("social@club.org")))
            .await
            .expect("first login");

        let before = store
            .find_by_email("social@club.org", OriginFilter::Any)
            .await
            .expect("lookup")
            .expect("account exists");

        let again = resolver
            .resolve(GOOGLE_PROVIDER, attrs(Some("social@club.org")))
            .await
            .expect("second login");

        let after = store
            .find_by_email("social@club.org", OriginFilter::Any)
            .await
            .expect("lookup")
            .expect("account exists");

        assert_eq!(again.email(), "social@club.org");
        assert_eq!(store.account_count(), 1);
        assert_eq!(before.password_hash, after.password_hash);
        assert_eq!(before.roles, after.roles);
        assert_eq!(before.name, after.name);
    }

    #[tokio::test]
    async fn social_login_reuses_an_existing_local_account() {
        let (resolver, store) = resolver();
        let password_service = PasswordService::new().expect("password service");
        let local_hash = password_service.hash_password("s3cret").expect("hash");
        store.insert_local("user1@club.org", "user one", &local_hash, &[MemberRole::User]);

        let member = resolver
            .resolve(GOOGLE_PROVIDER, attrs(Some("user1@club.org")))
            .await
            .expect("resolved");

        assert_eq!(store.account_count(), 1);
        assert_eq!(member.password_hash(), local_hash);
    }

    #[tokio::test]
    async fn unsupported_provider_never_touches_the_store() {
        let (resolver, store) = resolver();
        let err = resolver
            .resolve("Naver", attrs(Some("social@club.org")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedProvider(_)), "got {err:?}");
        assert_eq!(store.account_count(), 0);
    }
}
