//! End-to-end exercises of the filter chain, the API login endpoint, and
//! the session-based browser flow against an in-memory account store.

use club_api::auth::principal::MemberRole;
use club_api::auth::{AuthConfig, JwtService, PasswordService};
use club_api::test_support::{TestRocketBuilder, in_memory_auth_state};
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use rocket::{get, routes};
use serde_json::Value;

const TEST_SECRET: &str = "super-secret-test-key";
const TEST_TTL_SECS: i64 = 7 * 24 * 60 * 60;

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.into(),
        token_ttl_secs: TEST_TTL_SECS,
        protected_pattern: "/notes/**".into(),
        api_login_path: "/api/login".into(),
        session_cookie_name: "club_session".into(),
        cookie_secure: false,
        social_placeholder_password: "1111".into(),
        google_client_id: None,
        google_client_secret: None,
        google_redirect_url: None,
    }
}

/// Stand-in for a note route; only reachable once the token guard passes.
#[get("/notes/ping")]
fn notes_ping() -> &'static str {
    "pong"
}

fn pipeline_client() -> Client {
    let (state, store) = in_memory_auth_state(test_config());

    let password_service = PasswordService::new().expect("password service");
    let hash = password_service.hash_password("right").expect("hash");
    store.insert_local("user1@club.org", "user one", &hash, &[MemberRole::User]);

    TestRocketBuilder::new()
        .mount_routes(
            "/",
            routes![
                notes_ping,
                club_api::auth::routes::form_login,
                club_api::routes::sample::sample_member,
            ],
        )
        .with_auth(state)
        .blocking_client()
}

#[test]
fn protected_path_without_header_is_rejected() {
    let client = pipeline_client();

    let response = client.get("/notes/ping").dispatch();
    assert_eq!(response.status(), Status::Forbidden);
    assert_eq!(
        response.headers().get_one("Content-Type"),
        Some("application/json;charset=utf-8")
    );

    let body: Value =
        serde_json::from_str(&response.into_string().expect("body")).expect("json body");
    assert_eq!(body["code"], "403");
    assert_eq!(body["message"], "FAIL CHECK API TOKEN");
}

#[test]
fn protected_path_with_valid_token_passes() {
    let client = pipeline_client();

    let login = client
        .post("/api/login")
        .header(ContentType::Form)
        .body("email=user1%40club.org&pw=right")
        .dispatch();
    assert_eq!(login.status(), Status::Ok);
    assert_eq!(login.content_type(), Some(ContentType::Plain));
    let token = login.into_string().expect("token body");
    assert!(!token.is_empty());

    let response = client
        .get("/notes/ping")
        .header(Header::new("Authorization", format!("Bearer {token}")))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_string().as_deref(), Some("pong"));
}

#[test]
fn forged_or_garbled_tokens_are_rejected() {
    let client = pipeline_client();

    let other = JwtService::new("some-other-secret", TEST_TTL_SECS);
    let forged = other.issue("user1@club.org").expect("forged token");

    for token in [forged.token.as_str(), "garbage", ""] {
        let response = client
            .get("/notes/ping")
            .header(Header::new("Authorization", format!("Bearer {token}")))
            .dispatch();
        assert_eq!(response.status(), Status::Forbidden, "token {token:?}");
    }
}

#[test]
fn api_login_failures_are_401_json() {
    let client = pipeline_client();

    let cases = [
        ("email=user1%40club.org&pw=wrong", "Bad credentials"),
        ("email=nouser%40club.org&pw=right", "Check Email or Social"),
        ("email=&pw=right", "email cannot be null"),
    ];

    for (body, message) in cases {
        let response = client
            .post("/api/login")
            .header(ContentType::Form)
            .body(body)
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized, "body {body:?}");
        assert_eq!(
            response.headers().get_one("Content-Type"),
            Some("application/json; charset=utf-8")
        );

        let payload: Value =
            serde_json::from_str(&response.into_string().expect("body")).expect("json body");
        assert_eq!(payload["code"], "401");
        assert_eq!(payload["message"], message, "body {body:?}");
    }
}

#[test]
fn get_on_the_login_path_is_not_intercepted() {
    let client = pipeline_client();
    let response = client.get("/api/login").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn form_login_establishes_a_session() {
    let client = pipeline_client();

    let login = client
        .post("/login")
        .header(ContentType::Form)
        .body("email=user1%40club.org&pw=right")
        .dispatch();
    assert_eq!(login.status(), Status::SeeOther);
    assert_eq!(login.headers().get_one("Location"), Some("/"));
    assert!(login.cookies().get("club_session").is_some());

    let member = client.get("/sample/member").dispatch();
    assert_eq!(member.status(), Status::Ok);

    let payload: Value =
        serde_json::from_str(&member.into_string().expect("body")).expect("json body");
    assert_eq!(payload["email"], "user1@club.org");
    assert_eq!(payload["roles"][0], "ROLE_USER");
}

#[test]
fn form_login_failure_is_401_json() {
    let client = pipeline_client();

    let login = client
        .post("/login")
        .header(ContentType::Form)
        .body("email=user1%40club.org&pw=wrong")
        .dispatch();
    assert_eq!(login.status(), Status::Unauthorized);

    let payload: Value =
        serde_json::from_str(&login.into_string().expect("body")).expect("json body");
    assert_eq!(payload["code"], "401");

    let member = client.get("/sample/member").dispatch();
    assert_eq!(member.status(), Status::Unauthorized);
}
