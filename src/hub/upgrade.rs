use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::StreamExt;

use super::{ClientSession, Hub};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// `GET /ws`. Authentication runs before the upgrade is even looked at, so an
/// unauthenticated request never gets a socket.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    auth: AuthUser,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    if state.hub.is_closed().await {
        return Err(AppError::ServiceUnavailable(
            "server is shutting down".to_string(),
        ));
    }

    let ws = ws.map_err(|e| {
        AppError::BadRequest(format!("websocket upgrade failed: {}", e.body_text()))
    })?;

    let hub = state.hub.clone();
    let user_id = auth.user_id;
    Ok(ws
        .on_failed_upgrade(|e| tracing::warn!("websocket handshake failed: {e}"))
        .on_upgrade(move |socket| handle_socket(socket, hub, user_id)))
}

async fn handle_socket(socket: WebSocket, hub: Hub, user_id: String) {
    let (sink, stream) = socket.split();
    let session = ClientSession::new(user_id, sink, stream, hub.config().queue_capacity);

    if let Err(e) = hub.register(session).await {
        tracing::warn!("websocket session rejected: {e}");
    }
}
