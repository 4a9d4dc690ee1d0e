pub mod id;

pub use id::{Identity, SessionRecordId};
