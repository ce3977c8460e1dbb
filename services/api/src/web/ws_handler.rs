//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! It reads subscription commands and manages the spawned feed tasks.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    reply::service_failure,
    state::AppState,
    subscription_task::{chat_feed, returns_feed, roster_feed, send_message, WsSender},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use driverroom_core::{ServiceResult, User};
use futures::StreamExt;
use std::{future::Future, sync::Arc};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

/// The feeds running on one connection. They share one token so `unsubscribe`
/// stops them all.
struct Subscriptions {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscriptions {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, name: &'static str, ws_sender: WsSender, feed: F)
    where
        F: Future<Output = ServiceResult<()>> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = feed.await {
                let (_, message) = service_failure(name, e);
                send_message(&ws_sender, &ServerMessage::Error { message }).await;
            }
        }));
    }

    fn cancel_all(&mut self) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.tasks.clear();
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.token.cancel();
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: User) {
    info!("New WebSocket connection established for user: {}", user.user_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));
    let mut subscriptions = Subscriptions::new();

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                handle_text_message(
                    text.as_str(),
                    &app_state,
                    &user,
                    &ws_sender,
                    &mut subscriptions,
                )
                .await;
            }
            Message::Close(_) => {
                info!("Client sent close message.");
                break;
            }
            _ => {}
        }
    }

    info!("WebSocket connection closed for user: {}", user.user_id);
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    user: &User,
    ws_sender: &WsSender,
    subscriptions: &mut Subscriptions,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            let message = ServerMessage::Error {
                message: "Unrecognized message.".to_string(),
            };
            send_message(ws_sender, &message).await;
            return;
        }
    };

    let token = subscriptions.token.clone();
    match client_msg {
        ClientMessage::SubscribeRoster => {
            info!("Roster subscription for {}", user.user_id);
            let feed = roster_feed(
                app_state.board.clone(),
                user.clone(),
                ws_sender.clone(),
                token,
            );
            subscriptions.spawn("subscribe to roster", ws_sender.clone(), feed);
        }
        ClientMessage::SubscribeReturns => {
            let feed = returns_feed(
                app_state.board.clone(),
                user.clone(),
                ws_sender.clone(),
                token,
            );
            subscriptions.spawn("subscribe to returns", ws_sender.clone(), feed);
        }
        ClientMessage::SubscribeChat { chat_id } => {
            let feed = chat_feed(
                app_state.messaging.clone(),
                user.clone(),
                chat_id,
                ws_sender.clone(),
                token,
            );
            subscriptions.spawn("subscribe to chat", ws_sender.clone(), feed);
        }
        ClientMessage::Unsubscribe => {
            info!("Unsubscribe received from {}", user.user_id);
            subscriptions.cancel_all();
        }
    }
}
