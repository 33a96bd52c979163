//! WebSocket control channel endpoint.
//!
//! Each accepted upgrade becomes one session: a reader loop feeding raw
//! frames into the controller, and a writer task draining the session's
//! outbound channel into the socket. Either side failing tears the session
//! down and deregisters it.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::controller::ControllerHandle;
use crate::registry::SessionId;

use super::AppState;

/// Upgrade `/ws` and wire the connection into the controller.
pub async fn connect(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let (response, session, msg_stream) = actix_ws::handle(&req, payload)?;

    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();

    tracing::info!(session = %id, "WebSocket connected");
    state.controller.connect(id, tx);

    actix_web::rt::spawn(write_loop(session.clone(), rx));
    actix_web::rt::spawn(read_loop(id, session, msg_stream, state.controller.clone()));

    Ok(response)
}

/// Forward controller output to the socket until either end closes.
async fn write_loop(mut session: Session, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        if session.text(text).await.is_err() {
            break;
        }
    }
}

/// Forward inbound text frames to the controller; binary frames are ignored.
async fn read_loop(
    id: SessionId,
    mut session: Session,
    mut stream: MessageStream,
    controller: ControllerHandle,
) {
    while let Some(Ok(msg)) = stream.recv().await {
        match msg {
            Message::Text(text) => controller.frame(id, text.to_string()),
            Message::Ping(bytes) => {
                if session.pong(&bytes).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(session = %id, "WebSocket closed");
    controller.disconnect(id);
    let _ = session.close(None).await;
}

/// Configure the WebSocket route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/ws", web::get().to(connect));
}
