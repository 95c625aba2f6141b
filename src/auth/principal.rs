use std::collections::HashSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::store::MemberRecord;

/// Role grants a member can hold. Stored as upper-case codes in the
/// `member_roles` table; rendered with the `ROLE_` prefix where an authority
/// string is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    User,
    Manager,
    Admin,
}

impl MemberRole {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "USER" => Some(MemberRole::User),
            "MANAGER" => Some(MemberRole::Manager),
            "ADMIN" => Some(MemberRole::Admin),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            MemberRole::User => "USER",
            MemberRole::Manager => "MANAGER",
            MemberRole::Admin => "ADMIN",
        }
    }

    pub fn authority(&self) -> String {
        format!("ROLE_{}", self.code())
    }
}

/// Unified in-memory view of an authenticated member for one request or
/// session. Materialized from a stored record (plus the provider attribute
/// map for social logins) and never persisted itself.
#[derive(Debug, Clone)]
pub struct AuthMember {
    email: String,
    password_hash: String,
    name: String,
    roles: HashSet<MemberRole>,
    from_social: bool,
    attributes: Map<String, Value>,
}

impl AuthMember {
    /// Resolve a stored record into the pipeline representation. Total for
    /// any record the store hands out.
    pub fn from_record(record: MemberRecord) -> Self {
        Self {
            email: record.email,
            password_hash: record.password_hash,
            name: record.name,
            roles: record.roles.into_iter().collect(),
            from_social: record.from_social,
            attributes: Map::new(),
        }
    }

    /// Social-login variant: attaches the provider attribute map, populated
    /// exactly once from the provider response and read-only afterward.
    pub fn from_social_record(record: MemberRecord, attributes: Map<String, Value>) -> Self {
        let mut member = Self::from_record(record);
        member.from_social = true;
        member.attributes = attributes;
        member
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &HashSet<MemberRole> {
        &self.roles
    }

    pub fn from_social(&self) -> bool {
        self.from_social
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Pure authorization check, invoked at the routing layer.
    pub fn has_role(&self, role: MemberRole) -> bool {
        self.roles.contains(&role)
    }

    /// Prefixed authority strings, e.g. `ROLE_USER`.
    pub fn authorities(&self) -> HashSet<String> {
        self.roles.iter().map(MemberRole::authority).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(roles: Vec<MemberRole>) -> MemberRecord {
        MemberRecord {
            email: "user1@club.org".into(),
            password_hash: "$argon2id$stub".into(),
            name: "user one".into(),
            from_social: false,
            roles,
        }
    }

    #[test]
    fn maps_roles_through_the_naming_convention() {
        let member = AuthMember::from_record(record(vec![MemberRole::User, MemberRole::Admin]));

        assert!(member.has_role(MemberRole::User));
        assert!(member.has_role(MemberRole::Admin));
        assert!(!member.has_role(MemberRole::Manager));

        let authorities = member.authorities();
        assert!(authorities.contains("ROLE_USER"));
        assert!(authorities.contains("ROLE_ADMIN"));
    }

    #[test]
    fn role_codes_round_trip() {
        for role in [MemberRole::User, MemberRole::Manager, MemberRole::Admin] {
            assert_eq!(MemberRole::from_code(role.code()), Some(role));
        }
        assert_eq!(MemberRole::from_code("SUPERUSER"), None);
    }

    #[test]
    fn duplicate_role_codes_collapse() {
        let member = AuthMember::from_record(record(vec![MemberRole::User, MemberRole::User]));
        assert_eq!(member.roles().len(), 1);
    }

    #[test]
    fn social_record_carries_provider_attributes() {
        let mut attrs = Map::new();
        attrs.insert("email".into(), "user1@club.org".into());
        attrs.insert("picture".into(), "https://example.com/p.png".into());

        let member = AuthMember::from_social_record(record(vec![MemberRole::User]), attrs);

        assert!(member.from_social());
        assert_eq!(
            member.attributes().get("email").and_then(Value::as_str),
            Some("user1@club.org")
        );
    }

    #[test]
    fn local_record_has_no_attributes() {
        let member = AuthMember::from_record(record(vec![MemberRole::User]));
        assert!(!member.from_social());
        assert!(member.attributes().is_empty());
    }
}
