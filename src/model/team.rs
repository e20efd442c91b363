use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{TeamId, UserId};

/// Division a team competes in, e.g. "men" or "women".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(pub String);

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cycle {
    A,
    B,
}

impl Cycle {
    pub fn opposite(self) -> Self {
        match self {
            Cycle::A => Cycle::B,
            Cycle::B => Cycle::A,
        }
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::A => f.write_str("A"),
            Cycle::B => f.write_str("B"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub category: Category,
    // Assigned by the draw; None until then
    #[serde(default)]
    pub cycle: Option<Cycle>,
    #[serde(default)]
    pub captain_id: Option<UserId>,
}
