pub mod auth;
pub mod client;
pub mod me;

pub use auth::*;
pub use me::*;
