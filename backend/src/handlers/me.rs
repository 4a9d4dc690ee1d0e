use axum::{Extension, Json};

use crate::{models::auth::MeResponse, types::Identity};

pub async fn me(Extension(identity): Extension<Identity>) -> Json<MeResponse> {
    Json(MeResponse {
        guid: identity.to_string(),
    })
}
