use serde::{Deserialize, Serialize};

use crate::model::{TeamId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Captain,
    Member,
    Visitor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub team_id: Option<TeamId>,
}

impl User {
    /// True when this user is the captain of `team`.
    pub fn captains(&self, team: TeamId) -> bool {
        self.role == Role::Captain && self.team_id == Some(team)
    }
}
