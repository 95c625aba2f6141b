use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Claims carried by an issued token: the subject identity plus the
/// issuance/expiry pair the signature covers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates the signed identity tokens API clients carry in the
/// `Authorization` header. The validity window is fixed at issuance and the
/// compact JWT form keeps the token header-safe.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl_secs)
    }

    pub fn new(secret: &str, token_ttl_secs: i64) -> Self {
        let secret_bytes = secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key,
            decoding_key,
            validation,
            token_ttl: Duration::seconds(token_ttl_secs),
        }
    }

    /// Mint a token for `subject`, valid for the configured window starting
    /// now.
    pub fn issue(&self, subject: &str) -> AuthResult<SignedToken> {
        self.issue_at(subject, Utc::now())
    }

    fn issue_at(&self, subject: &str, issued_at: DateTime<Utc>) -> AuthResult<SignedToken> {
        let expires_at = issued_at + self.token_ttl;
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(SignedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the embedded subject.
    ///
    /// Anything that is not a clean pass maps into the token failure
    /// taxonomy; unexpected decode errors count as invalid rather than as a
    /// pass.
    pub fn validate_and_extract(&self, token: &str) -> AuthResult<String> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(classify_decode_error)?;
        Ok(data.claims.sub)
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidSignature => AuthError::TokenInvalid,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::MalformedToken
        }
        // Fail closed on anything unexpected.
        _ => AuthError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "super-secret-test-key";
    const TEST_TTL_SECS: i64 = 7 * 24 * 60 * 60;

    fn make_service() -> JwtService {
        JwtService::new(TEST_SECRET, TEST_TTL_SECS)
    }

    #[test]
    fn round_trips_the_subject() {
        let service = make_service();
        let signed = service.issue("user1@club.org").expect("issue token");

        assert!(!signed.token.contains(char::is_whitespace));
        assert_eq!(
            signed.expires_at - signed.issued_at,
            Duration::seconds(TEST_TTL_SECS)
        );

        let subject = service
            .validate_and_extract(&signed.token)
            .expect("validate token");
        assert_eq!(subject, "user1@club.org");
    }

    #[test]
    fn rejects_a_token_past_its_window() {
        let service = make_service();
        let issued_at = Utc::now() - Duration::seconds(TEST_TTL_SECS + 1);
        let signed = service
            .issue_at("user1@club.org", issued_at)
            .expect("issue token");

        let err = service.validate_and_extract(&signed.token).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired), "got {err:?}");
    }

    #[test]
    fn rejects_a_tampered_signature() {
        let service = make_service();
        let signed = service.issue("user1@club.org").expect("issue token");

        let (payload, signature) = signed.token.rsplit_once('.').expect("compact form");
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let flipped: String = chars.into_iter().collect();
        let tampered = format!("{payload}.{flipped}");

        let err = service.validate_and_extract(&tampered).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid), "got {err:?}");
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let service = make_service();
        let other = JwtService::new("a-different-secret", TEST_TTL_SECS);
        let signed = other.issue("user1@club.org").expect("issue token");

        let err = service.validate_and_extract(&signed.token).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid), "got {err:?}");
    }

    #[test]
    fn rejects_garbage_as_malformed() {
        let service = make_service();
        for input in ["", "not-a-token", "a.b", "a.b.c.d"] {
            let err = service.validate_and_extract(input).unwrap_err();
            assert!(matches!(err, AuthError::MalformedToken), "{input:?} -> {err:?}");
        }
    }
}
