use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ===== Notes =====

/// A note joined with its writer, as returned by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Note {
    pub num: i64,
    pub writer_email: String,
    pub writer_name: String,
    pub title: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Payload for registering or modifying a note.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoteRequest {
    pub writer_email: String,
    pub title: String,
    pub content: String,
}

// ===== Memberships =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Membership {
    pub user_id: String,
    pub membership_id: String,
    pub membership_name: String,
    pub membership_status: bool,
    pub point: i32,
}

/// Point accrual request for an existing membership.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PointRequest {
    pub user_id: String,
    pub membership_id: String,
    pub money: i32,
}

// ===== Members =====

/// Public view of an authenticated member; never includes the credential
/// hash.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MemberSummary {
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub from_social: bool,
}

impl From<&crate::auth::principal::AuthMember> for MemberSummary {
    fn from(member: &crate::auth::principal::AuthMember) -> Self {
        let mut roles: Vec<String> = member.authorities().into_iter().collect();
        roles.sort();
        Self {
            email: member.email().to_string(),
            name: member.name().to_string(),
            roles,
            from_social: member.from_social(),
        }
    }
}
