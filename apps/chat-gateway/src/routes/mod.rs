pub mod dev;
pub mod health;

use axum::Router;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(dev::router())
        .merge(crate::gateway::server::router())
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("token"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        dev::issue_session,
        crate::gateway::server::ws_upgrade,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Route response types
            health::HealthResponse,
            dev::DevSessionRequest,
            dev::DevSessionResponse,
            // Wire payloads carried over the WebSocket
            crate::gateway::events::Event,
            crate::gateway::events::MessageDraft,
            crate::gateway::events::MessageDto,
            crate::gateway::events::MessagesStatusDto,
            crate::chat::user::UserDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Chats", description = "Real-time chat gateway"),
        (name = "Dev", description = "Local session issuing, off unless DEV_SESSIONS is set"),
    )
)]
pub struct ApiDoc;
