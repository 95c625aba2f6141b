use rocket_db_pools::sqlx::{self, PgPool, Row};

use crate::auth::principal::MemberRole;
use crate::auth::{AuthError, AuthResult};

/// A persisted member account as the credential store hands it out.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub from_social: bool,
    pub roles: Vec<MemberRole>,
}

/// Which account origin a lookup should accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OriginFilter {
    /// Locally registered accounts only (password login path).
    Local,
    /// Accounts created through a social provider.
    Social,
    /// Any account sharing the identity space.
    Any,
}

/// Account lookup boundary consumed by the authentication pipeline.
///
/// `find_or_create_social` must be idempotent under concurrent first logins
/// for the same identity: at most one account may exist per email afterward.
#[rocket::async_trait]
pub trait MemberStore: Send + Sync {
    async fn find_by_email(
        &self,
        email: &str,
        origin: OriginFilter,
    ) -> AuthResult<Option<MemberRecord>>;

    /// Look up the account for a social identity, creating it on first
    /// login with the supplied (already hashed) placeholder credential and
    /// the default role. The find path returns the existing account
    /// unchanged.
    async fn find_or_create_social(
        &self,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<MemberRecord>;
}

/// Postgres-backed store over the `members` / `member_roles` tables.
pub struct PgMemberStore {
    pool: PgPool,
}

impl PgMemberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_roles(&self, email: &str) -> AuthResult<Vec<MemberRole>> {
        let rows = sqlx::query("SELECT role FROM member_roles WHERE member_email = $1")
            .bind(email)
            .fetch_all(&self.pool)
            .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let code: String = row.try_get("role")?;
            match MemberRole::from_code(&code) {
                Some(role) => roles.push(role),
                None => log::warn!("ignoring unknown role code '{code}' for {email}"),
            }
        }
        Ok(roles)
    }
}

#[rocket::async_trait]
impl MemberStore for PgMemberStore {
    async fn find_by_email(
        &self,
        email: &str,
        origin: OriginFilter,
    ) -> AuthResult<Option<MemberRecord>> {
        let row = match origin {
            OriginFilter::Any => {
                sqlx::query(
                    "SELECT email, password_hash, name, from_social FROM members WHERE email = $1",
                )
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
            }
            OriginFilter::Local | OriginFilter::Social => {
                sqlx::query(
                    "SELECT email, password_hash, name, from_social FROM members \
                     WHERE email = $1 AND from_social = $2",
                )
                .bind(email)
                .bind(origin == OriginFilter::Social)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let email: String = row.try_get("email")?;
        let roles = self.load_roles(&email).await?;

        Ok(Some(MemberRecord {
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            from_social: row.try_get("from_social")?,
            email,
            roles,
        }))
    }

    async fn find_or_create_social(
        &self,
        email: &str,
        password_hash: &str,
    ) -> AuthResult<MemberRecord> {
        // The unique constraint on `members.email` decides the race between
        // two concurrent first logins; whoever loses the insert re-reads the
        // winning row below.
        let inserted = sqlx::query(
            "INSERT INTO members (email, password_hash, name, from_social) \
             VALUES ($1, $2, $3, TRUE) ON CONFLICT (email) DO NOTHING",
        )
        .bind(email)
        .bind(password_hash)
        .bind(email)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            sqlx::query(
                "INSERT INTO member_roles (member_email, role) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(email)
            .bind(MemberRole::User.code())
            .execute(&self.pool)
            .await?;
            log::info!("created social member account for {email}");
        }

        self.find_by_email(email, OriginFilter::Any)
            .await?
            .ok_or_else(|| AuthError::Other(format!("social account for {email} disappeared")))
    }
}
