use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use hive_core::models::ChatMessage;
use hive_core::services::ChatPage;
use hive_core::store::Store;
use hive_shared::errors::{AppError, AppResult};
use hive_shared::types::auth::AuthUser;
use hive_shared::types::ApiResponse;

use crate::chat::ChatEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub cursor: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub token: String,
}

/// What clients send, over HTTP or the socket.
#[derive(Debug, Deserialize)]
pub struct PostMessage {
    pub message: String,
}

pub async fn history<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> AppResult<ApiResponse<ChatPage>> {
    let page = state
        .run(move |engine| engine.chat_history(project_id, user.id, params.cursor, params.limit))
        .await?;
    Ok(ApiResponse::ok(page))
}

pub async fn post_message<S: Store>(
    user: AuthUser,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<PostMessage>,
) -> AppResult<ApiResponse<ChatMessage>> {
    let message = store_and_fan_out(&state, project_id, user.id, req.message).await?;
    Ok(ApiResponse::created(message))
}

async fn store_and_fan_out<S: Store>(state: &AppState<S>, project_id: Uuid, user_id: Uuid, content: String) -> AppResult<ChatMessage> {
    let message = state
        .run(move |engine| engine.post_chat_message(project_id, user_id, &content))
        .await?;
    let receivers = state.chat.publish(message.clone()).await;
    tracing::debug!(message_id = %message.id, receivers, "chat message relayed");
    Ok(message)
}

/// Browsers cannot set headers on a socket upgrade, so the access token
/// travels in the query string. Membership is checked before upgrading.
pub async fn socket<S: Store>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<S>>,
    Path(project_id): Path<Uuid>,
    Query(params): Query<SocketParams>,
) -> AppResult<Response> {
    let user = AuthUser::from(state.keys.verify(&params.token)?);
    let user_id = user.id;
    state.run(move |engine| engine.ensure_chat_member(project_id, user_id)).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, project_id, user_id)))
}

async fn handle_socket<S: Store>(socket: WebSocket, state: AppState<S>, project_id: Uuid, user_id: Uuid) {
    tracing::info!(project_id = %project_id, user_id = %user_id, "chat socket connected");
    let mut rx = state.chat.subscribe(project_id).await;
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if send(&mut sink, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(project_id = %project_id, user_id = %user_id, skipped, "chat socket lagging");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Err(err) = handle_incoming(&state, project_id, user_id, &text).await {
                        let frame = ChatEvent::Error {
                            code: err.code().code().to_string(),
                            message: err.to_string(),
                        };
                        if send(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(user_id = %user_id, error = %e, "chat socket receive error");
                    break;
                }
            },
        }
    }

    drop(rx);
    state.chat.release(project_id).await;
    tracing::info!(project_id = %project_id, user_id = %user_id, "chat socket disconnected");
}

/// The sender gets its own message back through the room broadcast.
async fn handle_incoming<S: Store>(state: &AppState<S>, project_id: Uuid, user_id: Uuid, text: &str) -> AppResult<()> {
    let frame: PostMessage = serde_json::from_str(text)
        .map_err(|_| AppError::bad_request("expected {\"message\": string}"))?;
    store_and_fan_out(state, project_id, user_id, frame.message).await?;
    Ok(())
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, event: &ChatEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sink.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode chat frame");
            Ok(())
        }
    }
}
