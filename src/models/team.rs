use serde::{Deserialize, Serialize};

use super::{EntityId, Identifiable, MemberRole};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// The requesting user's role in this team.
    pub role: MemberRole,
}

impl Identifiable for Team {
    fn key(&self) -> EntityId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_role_is_viewer_relative() {
        let team: Team =
            serde_json::from_str(r#"{"id":7,"name":"Platform","role":"ADMIN"}"#).unwrap();
        assert_eq!(team.key(), 7);
        assert_eq!(team.description, None);
        assert!(team.role.is_manager());
    }
}
