//! services/api/src/web/profile.rs
//!
//! Endpoints for the signed-in user's profile, which links the account to an
//! AtCoder id. Problem views are unavailable until the id is set.

use axum::{extract::State, http::StatusCode, Extension, Json};
use problem_dojo_core::domain::UserProfile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub atcoder_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub atcoder_id: Option<String>,
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            atcoder_id: profile.atcoder_id,
        }
    }
}

/// AtCoder user names are 3 to 16 ASCII letters, digits or underscores.
pub fn is_valid_atcoder_id(id: &str) -> bool {
    (3..=16).contains(&id.len()) && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns the linked AtCoder id, or `412` if the profile has none.
pub async fn require_atcoder_id(
    state: &AppState,
    user_id: Uuid,
) -> Result<String, (StatusCode, String)> {
    let profile = state.db.get_profile(user_id).await.map_err(|e| {
        error!("Failed to load profile for {}: {:?}", user_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load profile".to_string())
    })?;

    profile.atcoder_id.ok_or((
        StatusCode::PRECONDITION_FAILED,
        "Link your AtCoder ID before viewing problems".to_string(),
    ))
}

/// GET /profile - The signed-in user's profile
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let profile = state.db.get_profile(user_id).await.map_err(|e| {
        error!("Failed to load profile for {}: {:?}", user_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load profile".to_string())
    })?;
    Ok(Json(profile.into()))
}

/// PUT /profile - Link the account to an AtCoder id
#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid AtCoder ID"),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let atcoder_id = req.atcoder_id.trim();
    if !is_valid_atcoder_id(atcoder_id) {
        return Err((StatusCode::BAD_REQUEST, "Enter a valid AtCoder ID".to_string()));
    }

    let profile = state
        .db
        .set_atcoder_id(user_id, atcoder_id)
        .await
        .map_err(|e| {
            error!("Failed to save AtCoder ID for {}: {:?}", user_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save AtCoder ID".to_string())
        })?;

    info!("User {} linked AtCoder ID {}", user_id, atcoder_id);
    Ok(Json(profile.into()))
}
