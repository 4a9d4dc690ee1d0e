//! Validation rules shared across request payloads.

use uuid::Uuid;
use validator::ValidationError;

/// Validates that a client-supplied identity is a canonical UUID.
pub fn validate_guid(guid: &str) -> Result<(), ValidationError> {
    if guid.trim().is_empty() {
        return Err(ValidationError::new("guid_required"));
    }
    Uuid::parse_str(guid)
        .map(|_| ())
        .map_err(|_| ValidationError::new("guid_invalid"))
}
