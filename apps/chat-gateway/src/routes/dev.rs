//! Development session issuing. Served only when `DEV_SESSIONS` is enabled.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::tokens::SESSION_TTL_SECS;
use crate::chat::user::{User, UserDto, USER_ROLE};
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/dev/sessions", post(issue_session))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DevSessionRequest {
    pub user_id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DevSessionResponse {
    pub token: String,
    pub session_id: String,
    pub expires_in: u64,
    pub ws_url: String,
    pub user: UserDto,
}

#[utoipa::path(
    post,
    path = "/dev/sessions",
    tag = "Dev",
    request_body = DevSessionRequest,
    responses(
        (status = 200, description = "Session issued", body = DevSessionResponse),
        (status = 400, description = "Invalid user", body = ApiErrorBody),
        (status = 404, description = "Dev sessions disabled", body = ApiErrorBody),
    ),
)]
pub async fn issue_session(
    State(state): State<AppState>,
    Json(body): Json<DevSessionRequest>,
) -> Result<Json<DevSessionResponse>, ApiError> {
    let issuer = state
        .dev_sessions
        .as_ref()
        .ok_or_else(|| ApiError::not_found("Not found"))?;

    let username = body.username.trim();
    if body.user_id == 0 || username.is_empty() {
        return Err(ApiError::bad_request("user_id and username are required"));
    }

    let now = chrono::Utc::now();
    let user = User {
        id: body.user_id,
        email: body.email,
        username: username.to_string(),
        role: USER_ROLE,
        first_name: body.first_name,
        last_name: body.last_name,
        about_me: String::new(),
        created_at: now,
        updated_at: now,
    };

    let (token, session) = issuer.issue(user).await?;
    tracing::info!(user_id = session.user.id, session_id = %session.id, "dev session issued");

    Ok(Json(DevSessionResponse {
        token,
        session_id: session.id.clone(),
        expires_in: SESSION_TTL_SECS,
        ws_url: "/chats/ws".to_string(),
        user: UserDto::from(&session.user),
    }))
}
