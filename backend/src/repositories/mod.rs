#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod revocation;
pub mod session_record;
pub mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::{InMemoryRevocationLedger, InMemorySessionRecords};
pub use revocation::{BlockOutcome, LedgerError, PgRevocationLedger, RevocationLedger};
pub use session_record::{PgSessionRecordRepository, SessionRecordRepository, StoreError};
