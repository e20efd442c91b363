pub mod game;
pub mod slot;
pub mod status;
pub mod team;
pub mod user;

pub type TeamId = i64;
pub type UserId = i64;
pub type MatchId = i64;
