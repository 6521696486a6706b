//! WebSocket upgrade route and the axum transport adapter.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

use crate::auth::middleware::AuthSession;
use crate::chat::user::Session;
use crate::AppState;

use super::transport::{FrameReader, FrameWriter, TransportError};

pub fn router() -> Router<AppState> {
    Router::new().route("/chats/ws", get(ws_upgrade))
}

/// Upgrade an authenticated request to a chat WebSocket.
#[utoipa::path(
    get,
    path = "/chats/ws",
    tag = "Chats",
    security(("token" = []), ("bearer" = [])),
    params(
        ("token" = Option<String>, Query, description = "Session token; falls back to the Authorization header"),
    ),
    responses(
        (status = 101, description = "Switching protocols; frames carry {type, data} events"),
        (status = 401, description = "Missing or unknown session token", body = crate::error::ApiErrorBody),
    ),
)]
pub async fn ws_upgrade(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state, session, socket))
}

async fn serve_socket(state: AppState, session: Session, socket: WebSocket) {
    let user_id = session.user.id;
    let (sink, stream) = socket.split();

    if let Err(err) = state.connector.add_connection(
        session,
        Box::new(WsReader { stream }),
        Box::new(WsWriter { sink }),
    ) {
        tracing::warn!(user_id, %err, "websocket connection refused");
    }
}

/// Read half of an upgraded axum WebSocket.
pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        while let Some(msg) = self.stream.next().await {
            let msg = msg.map_err(|e| TransportError::Failed(e.to_string()))?;
            match msg {
                Message::Text(text) => return Ok(Some(text.as_str().as_bytes().to_vec())),
                Message::Binary(bytes) => return Ok(Some(bytes.to_vec())),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }
}

/// Write half of an upgraded axum WebSocket.
pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, frame: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        SinkExt::close(&mut self.sink)
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))
    }
}
