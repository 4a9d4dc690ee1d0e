use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::rules;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
/// Payload for issuing the first token pair of an identity.
pub struct IssueTokenRequest {
    /// Client-chosen identity; must be a UUID.
    #[validate(custom(function = "rules::validate_guid"))]
    #[schema(example = "11111111-1111-1111-1111-111111111111")]
    pub guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
/// Access token returned by issuance and rotation. The refresh token travels
/// in the `refresh_token` cookie.
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
