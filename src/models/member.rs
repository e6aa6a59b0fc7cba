use serde::{Deserialize, Serialize};
use std::fmt;

use super::{EntityId, Identifiable};

/// Role of a user within a project or team. Always relative to that scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
}

impl MemberRole {
    pub const ALL: [MemberRole; 3] = [MemberRole::Owner, MemberRole::Admin, MemberRole::Member];

    /// OWNER or ADMIN: the roles with project-level management rights.
    pub fn is_manager(self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRole::Owner => write!(f, "OWNER"),
            MemberRole::Admin => write!(f, "ADMIN"),
            MemberRole::Member => write!(f, "MEMBER"),
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OWNER" => Ok(MemberRole::Owner),
            "ADMIN" => Ok(MemberRole::Admin),
            "MEMBER" => Ok(MemberRole::Member),
            _ => Err(format!("Invalid member role: {}", s)),
        }
    }
}

/// A project or team member as listed by the members endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: EntityId,
    pub username: String,
    pub email: String,
    pub role: MemberRole,
}

impl Identifiable for Member {
    fn key(&self) -> EntityId {
        self.user_id
    }
}

/// Which membership list a member mutation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberScope {
    Project(EntityId),
    Team(EntityId),
}

impl MemberScope {
    pub fn members_path(&self) -> String {
        match self {
            MemberScope::Project(id) => format!("/projects/{}/members", id),
            MemberScope::Team(id) => format!("/teams/{}/members", id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: MemberRole,
}
