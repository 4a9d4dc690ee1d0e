//! Data models shared across database access and API handlers.

pub mod auth;
pub mod session_record;
