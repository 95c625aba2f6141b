#[macro_use]
extern crate rocket;

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod request_logger;
pub mod routes;

use std::sync::{Arc, Once};

use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};

use crate::auth::store::PgMemberStore;
use crate::auth::{AuthConfig, AuthFilterChain, AuthFilters, AuthState, PasswordService};
use crate::db::{ClubDb, MIGRATOR};
use crate::request_logger::RequestLogger;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    // The signing secret and the rest of the auth settings are read exactly
    // once; nothing mutates them after this point.
    let auth_config = AuthConfig::from_env().expect("auth configuration");

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(ClubDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match ClubDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match MIGRATOR.run(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Assemble the auth pipeline: services, member store, and the
        // statically ordered filter chain.
        .attach(AdHoc::try_on_ignite(
            "Auth Pipeline",
            move |rocket| async move {
                let pool = match ClubDb::fetch(&rocket) {
                    Some(db) => (**db).clone(),
                    None => {
                        log::error!("database pool not available for auth pipeline");
                        return Err(rocket);
                    }
                };

                let password_service = match PasswordService::new() {
                    Ok(service) => service,
                    Err(e) => {
                        log::error!("password service init failed: {}", e);
                        return Err(rocket);
                    }
                };

                let member_store = Arc::new(PgMemberStore::new(pool.clone()));
                let state = match AuthState::new(auth_config, password_service, member_store) {
                    Ok(state) => state,
                    Err(e) => {
                        log::error!("auth state init failed: {}", e);
                        return Err(rocket);
                    }
                };
                let chain = AuthFilterChain::new(&state);

                Ok(rocket.manage(pool).manage(state).manage(chain))
            },
        ))
        .attach(AuthFilters)
        .mount(
            "/",
            openapi_get_routes![
                // Home & health
                routes::home::hello,
                routes::health::health_check,
                // Role-demo routes
                routes::sample::sample_all,
                routes::sample::sample_member,
                routes::sample::sample_admin,
                // Note routes (behind the token guard)
                routes::notes::register_note,
                routes::notes::read_note,
                routes::notes::list_notes,
                routes::notes::modify_note,
                routes::notes::remove_note,
                // Membership routes
                routes::membership::register_membership,
                routes::membership::list_memberships,
                routes::membership::add_points,
                // Member self-service
                routes::members::modify_prompt,
                routes::members::modify_password,
                // Browser auth surface
                auth::routes::form_login,
                auth::routes::logout,
                auth::routes::google_authorize,
                auth::routes::google_callback,
            ],
        )
        .mount("/__auth", routes![auth::routes::chain_terminal])
        .mount(
            "/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Club API", "../../openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::Database;
    use rocket_db_pools::sqlx::{self, PgPool};

    use crate::auth::principal::MemberRole;
    use crate::auth::store::{MemberRecord, MemberStore, OriginFilter};
    use crate::auth::{AuthFilterChain, AuthFilters, AuthResult, AuthState};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Account store backed by a plain map, for tests that exercise the
    /// pipeline without a database.
    #[derive(Default)]
    pub struct InMemoryMemberStore {
        accounts: Mutex<HashMap<String, MemberRecord>>,
    }

    impl InMemoryMemberStore {
        pub fn insert_local(
            &self,
            email: &str,
            name: &str,
            password_hash: &str,
            roles: &[MemberRole],
        ) {
            let mut accounts = self.accounts.lock().expect("store lock");
            accounts.insert(
                email.to_string(),
                MemberRecord {
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                    name: name.to_string(),
                    from_social: false,
                    roles: roles.to_vec(),
                },
            );
        }

        pub fn insert_social(&self, email: &str, password_hash: &str) {
            let mut accounts = self.accounts.lock().expect("store lock");
            accounts.insert(
                email.to_string(),
                MemberRecord {
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                    name: email.to_string(),
                    from_social: true,
                    roles: vec![MemberRole::User],
                },
            );
        }

        pub fn account_count(&self) -> usize {
            self.accounts.lock().expect("store lock").len()
        }
    }

    #[rocket::async_trait]
    impl MemberStore for InMemoryMemberStore {
        async fn find_by_email(
            &self,
            email: &str,
            origin: OriginFilter,
        ) -> AuthResult<Option<MemberRecord>> {
            let accounts = self.accounts.lock().expect("store lock");
            Ok(accounts
                .get(email)
                .filter(|record| match origin {
                    OriginFilter::Any => true,
                    OriginFilter::Local => !record.from_social,
                    OriginFilter::Social => record.from_social,
                })
                .cloned())
        }

        async fn find_or_create_social(
            &self,
            email: &str,
            password_hash: &str,
        ) -> AuthResult<MemberRecord> {
            let mut accounts = self.accounts.lock().expect("store lock");
            let record = accounts
                .entry(email.to_string())
                .or_insert_with(|| MemberRecord {
                    email: email.to_string(),
                    password_hash: password_hash.to_string(),
                    name: email.to_string(),
                    from_social: true,
                    roles: vec![MemberRole::User],
                });
            Ok(record.clone())
        }
    }

    /// Convenience helpers for seeding member- and note-related tables in
    /// database-backed tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a member row plus its role grants.
        pub async fn insert_member(
            &self,
            email: &str,
            name: &str,
            password_hash: &str,
            from_social: bool,
            roles: &[MemberRole],
        ) -> Result<(), sqlx::Error> {
            sqlx::query(
                "INSERT INTO members (email, password_hash, name, from_social) VALUES ($1, $2, $3, $4)",
            )
            .bind(email)
            .bind(password_hash)
            .bind(name)
            .bind(from_social)
            .execute(self.pool)
            .await?;

            for role in roles {
                sqlx::query("INSERT INTO member_roles (member_email, role) VALUES ($1, $2)")
                    .bind(email)
                    .bind(role.code())
                    .execute(self.pool)
                    .await?;
            }

            Ok(())
        }

        /// Insert a note and return its number.
        pub async fn insert_note(
            &self,
            writer_email: &str,
            title: &str,
            content: &str,
        ) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar(
                "INSERT INTO notes (writer_email, title, content) VALUES ($1, $2, $3) RETURNING num",
            )
            .bind(writer_email)
            .bind(title)
            .bind(content)
            .fetch_one(self.pool)
            .await
        }
    }

    pub mod database {
        use rocket_db_pools::sqlx::postgres::PgPoolOptions;
        use rocket_db_pools::sqlx::{self, PgPool};
        use testcontainers::core::error::TestcontainersError;
        use testcontainers::{ContainerAsync, runners::AsyncRunner};
        use testcontainers_modules::postgres::Postgres;
        use thiserror::Error;

        use crate::db::MIGRATOR;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral, fully migrated Postgres for integration tests. Tests
        /// should skip (not fail) when no container runtime is available.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            url: String,
            container: Option<ContainerAsync<Postgres>>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Postgres::default().start().await?;

                let host = container.get_host().await?;
                let port = container.get_host_port_ipv4(5432).await?;
                let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&url)
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    url,
                    container: Some(container),
                })
            }

            /// Connection URL of the provisioned database.
            pub fn url(&self) -> &str {
                &self.url
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }
                if let Some(container) = self.container.take() {
                    drop(container);
                }
                Ok(())
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        auth_state: Option<AuthState>,
        attach_club_db: bool,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging
        /// disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
                auth_state: None,
                attach_club_db: false,
            }
        }

        /// Point the managed `ClubDb` pool at the given database so routes
        /// taking `Connection<ClubDb>` work against it.
        pub fn with_club_db(mut self, url: &str) -> Self {
            self.figment = self.figment.merge(("databases.club_db.url", url));
            self.attach_club_db = true;
            self
        }

        /// Mount routes under the given base path.
        pub fn mount_routes(mut self, base: &str, routes: Vec<Route>) -> Self {
            self.mounts.push((base.to_string(), routes));
            self
        }

        /// Manage a `PgPool` for tests that exercise database-backed routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        /// Wire the full auth pipeline: managed state, the filter chain, the
        /// fairing, and the internal terminal route.
        pub fn with_auth(mut self, state: AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        /// Finish building the Rocket instance.
        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            if self.attach_club_db {
                rocket = rocket.attach(crate::db::ClubDb::init());
            }

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            if let Some(state) = self.auth_state {
                let chain = AuthFilterChain::new(&state);
                rocket = rocket
                    .manage(state)
                    .manage(chain)
                    .attach(AuthFilters)
                    .mount(
                        "/__auth",
                        rocket::routes![crate::auth::routes::chain_terminal],
                    );
            }

            rocket
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }

    /// Arc-wrapped in-memory store plus matching auth state, the common
    /// fixture for pipeline tests.
    pub fn in_memory_auth_state(
        config: crate::auth::AuthConfig,
    ) -> (AuthState, Arc<InMemoryMemberStore>) {
        let password_service =
            crate::auth::PasswordService::new().expect("password service");
        let store = Arc::new(InMemoryMemberStore::default());
        let state = AuthState::new(config, password_service, store.clone()).expect("auth state");
        (state, store)
    }
}
