pub mod config;
pub mod discord;
pub mod handler;
pub mod ical;
pub mod league;
pub mod locks;
pub mod model;
pub mod referee;
pub mod scheduler;
pub mod slots;
pub mod store;
pub mod workflow;
