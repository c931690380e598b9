//! The internal `/internal/pty/:id` channel: daemon-to-runtime in
//! gateway-proxy mode. Same frame semantics as the operator channel but
//! the session id is bound to the URL path, not carried per-frame, and
//! there is no message-level rate limit.

use axum::extract::ws::{Message, WebSocket};
use tokio::time::{interval, Duration};
use uuid::Uuid;

use codeck_pty::types::Geometry;

use crate::state::SharedState;
use crate::ws::frames::{InternalClientFrame, InternalServerFrame, MAX_INPUT_BYTES};

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Drive one internal PTY channel, bound to `session_id`, until the
/// socket closes or the session exits.
pub async fn run(mut socket: WebSocket, state: SharedState, session_id: Uuid) {
    let client_id = Uuid::new_v4();
    let attach_result = state.pty.attach(session_id, client_id, Geometry::INITIAL);
    let (initial, mut output_rx) = match attach_result {
        Ok(pair) => pair,
        Err(e) => {
            let frame = InternalServerFrame::ConsoleError { error: e.to_string() };
            let _ = send_frame(&mut socket, &frame).await;
            return;
        }
    };

    if !initial.is_empty() {
        let data = String::from_utf8_lossy(&initial).into_owned();
        if send_frame(&mut socket, &InternalServerFrame::ConsoleOutput { data }).await.is_err() {
            let _ = state.pty.detach(session_id, client_id);
            return;
        }
    }

    let Ok(mut exit_rx) = state.pty.subscribe_exit(session_id) else {
        let _ = state.pty.detach(session_id, client_id);
        return;
    };

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.tick().await;
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong {
                    break;
                }
                if socket.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }
            changed = exit_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(code) = *exit_rx.borrow() {
                    let _ = send_frame(&mut socket, &InternalServerFrame::ConsoleExit { exit_code: Some(code) }).await;
                    break;
                }
            }
            output = output_rx.recv() => {
                match output {
                    Ok(bytes) => {
                        let data = String::from_utf8_lossy(&bytes).into_owned();
                        if send_frame(&mut socket, &InternalServerFrame::ConsoleOutput { data }).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                let Some(result) = incoming else { break };
                match result {
                    Ok(Message::Text(text)) => {
                        handle_frame(&state, session_id, client_id, &text).await;
                    }
                    Ok(Message::Pong(_)) => awaiting_pong = false,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        }
    }

    let _ = state.pty.detach(session_id, client_id);
}

async fn send_frame(socket: &mut WebSocket, frame: &InternalServerFrame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(json.into())).await
}

async fn handle_frame(state: &SharedState, session_id: Uuid, client_id: Uuid, text: &str) {
    let Ok(frame) = serde_json::from_str::<InternalClientFrame>(text) else {
        return;
    };
    match frame {
        InternalClientFrame::ConsoleInput { data } => {
            if data.len() > MAX_INPUT_BYTES {
                return;
            }
            let _ = state.pty.write_input(session_id, data.into_bytes()).await;
        }
        InternalClientFrame::ConsoleResize { cols, rows } => {
            if let Ok(geometry) = Geometry::validate(cols, rows) {
                let _ = state.pty.resize(session_id, client_id, geometry);
            }
        }
    }
}
