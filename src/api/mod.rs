// API module - HTTP endpoints

pub mod analytics;
pub mod attendance;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod sessions;
