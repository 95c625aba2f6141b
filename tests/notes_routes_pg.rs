//! Database-backed integration tests. These provision a disposable Postgres
//! container and skip gracefully when no container runtime is available.

use std::sync::Arc;

use club_api::auth::principal::MemberRole;
use club_api::auth::store::{MemberStore, OriginFilter, PgMemberStore};
use club_api::auth::{AuthConfig, AuthState, PasswordService};
use club_api::test_support::{TestDatabase, TestFixtures, TestRocketBuilder};
use rocket::http::{ContentType, Header, Status};
use rocket::routes;
use serde_json::{Value, json};

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "super-secret-test-key".into(),
        token_ttl_secs: 7 * 24 * 60 * 60,
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

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new().await {
        Ok(db) => Some(db),
        Err(err) => {
            eprintln!("skipping database integration test: {err}");
            None
        }
    }
}

#[tokio::test]
async fn notes_crud_behind_the_token_guard() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();

    let password_service = PasswordService::new().expect("password service");
    let hash = password_service.hash_password("right").expect("hash");
    TestFixtures::new(&pool)
        .insert_member("user1@club.org", "user one", &hash, false, &[MemberRole::User])
        .await
        .expect("seed member");

    let store = Arc::new(PgMemberStore::new(pool.clone()));
    let state = AuthState::new(test_config(), password_service, store).expect("auth state");

    let client = TestRocketBuilder::new()
        .with_club_db(test_db.url())
        .manage_pg_pool(pool.clone())
        .mount_routes(
            "/",
            routes![
                club_api::routes::notes::register_note,
                club_api::routes::notes::read_note,
                club_api::routes::notes::list_notes,
                club_api::routes::notes::modify_note,
                club_api::routes::notes::remove_note,
            ],
        )
        .with_auth(state)
        .async_client()
        .await;

    // Guard first: no header means no note access.
    let denied = client.get("/notes/all?email=user1%40club.org").dispatch().await;
    assert_eq!(denied.status(), Status::Forbidden);
    drop(denied);

    let login = client
        .post("/api/login")
        .header(ContentType::Form)
        .body("email=user1%40club.org&pw=right")
        .dispatch()
        .await;
    assert_eq!(login.status(), Status::Ok);
    let token = login.into_string().await.expect("token body");
    let bearer = || Header::new("Authorization", format!("Bearer {token}"));

    let created = client
        .post("/notes")
        .header(ContentType::JSON)
        .header(bearer())
        .body(
            json!({
                "writer_email": "user1@club.org",
                "title": "first note",
                "content": "hello",
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(created.status(), Status::Ok);
    let num: i64 = created.into_json().await.expect("note number");

    let fetched = client
        .get(format!("/notes/{num}"))
        .header(bearer())
        .dispatch()
        .await;
    assert_eq!(fetched.status(), Status::Ok);
    let note: Value = fetched.into_json().await.expect("note json");
    assert_eq!(note["title"], "first note");
    assert_eq!(note["writer_name"], "user one");

    let modified = client
        .put(format!("/notes/{num}"))
        .header(ContentType::JSON)
        .header(bearer())
        .body(
            json!({
                "writer_email": "user1@club.org",
                "title": "first note",
                "content": "edited",
            })
            .to_string(),
        )
        .dispatch()
        .await;
    assert_eq!(modified.status(), Status::Ok);
    assert_eq!(modified.into_string().await.as_deref(), Some("modified"));

    let listed = client
        .get("/notes/all?email=user1%40club.org")
        .header(bearer())
        .dispatch()
        .await;
    assert_eq!(listed.status(), Status::Ok);
    let notes: Value = listed.into_json().await.expect("notes json");
    assert_eq!(notes.as_array().map(Vec::len), Some(1));
    assert_eq!(notes[0]["content"], "edited");

    let removed = client
        .delete(format!("/notes/{num}"))
        .header(bearer())
        .dispatch()
        .await;
    assert_eq!(removed.status(), Status::Ok);
    assert_eq!(removed.into_string().await.as_deref(), Some("removed"));

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn social_find_or_create_is_idempotent_in_postgres() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();

    let password_service = PasswordService::new().expect("password service");
    let placeholder_hash = password_service.hash_password("1111").expect("hash");
    let store = PgMemberStore::new(pool.clone());

    let first = store
        .find_or_create_social("social@club.org", &placeholder_hash)
        .await
        .expect("first login creates");
    assert!(first.from_social);
    assert_eq!(first.roles, vec![MemberRole::User]);
    assert_eq!(first.name, "social@club.org");

    let second = store
        .find_or_create_social("social@club.org", "ignored-on-repeat")
        .await
        .expect("second login finds");
    assert_eq!(second.password_hash, first.password_hash);
    assert_eq!(second.roles, first.roles);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 1);

    // A pre-existing local account shares the identity space: the social
    // path finds it and never overwrites its credential.
    let local_hash = password_service.hash_password("s3cret").expect("hash");
    TestFixtures::new(&pool)
        .insert_member("local@club.org", "local one", &local_hash, false, &[MemberRole::User])
        .await
        .expect("seed local member");

    let reused = store
        .find_or_create_social("local@club.org", &placeholder_hash)
        .await
        .expect("social login reuses local account");
    assert_eq!(reused.password_hash, local_hash);
    assert!(!reused.from_social);

    let lookup = store
        .find_by_email("local@club.org", OriginFilter::Social)
        .await
        .expect("lookup");
    assert!(lookup.is_none());

    test_db.close().await.expect("failed to drop test database");
}
