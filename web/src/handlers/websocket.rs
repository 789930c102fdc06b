//! WebSocket endpoint streaming order events.
//!
//! # Architecture
//!
//! ```text
//! Client          WebSocket Handler           Notifier
//!   │                    │                       │
//!   ├─ Connect ─────────>│                       │
//!   ├─ subscribe ───────>│                       │
//!   │                    ├─ subscribe(interest) ─>│
//!   │<─ subscribed ──────┤                       │
//!   │                    │<── OrderCreated ──────┤
//!   │<─ OrderCreated ────┤                       │
//! ```
//!
//! # Message Protocol
//!
//! **Client → Server:**
//! ```json
//! { "type": "subscribe", "shopId": "s1" }
//! { "type": "subscribe", "clientId": "c1" }
//! { "type": "ping" }
//! ```
//!
//! **Server → Client:**
//! ```json
//! { "type": "subscribed", "shopId": "s1" }
//! { "type": "OrderCreated", "order": { ... } }
//! { "type": "OrderUpdated", "order": { ... } }
//! { "type": "error", "message": "..." }
//! { "type": "pong" }
//! ```
//!
//! A connection holds at most one subscription. Subscribing again replaces
//! the previous interest.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use bookstore_core::{ClientId, Interest, ShopId};
use bookstore_runtime::{Notifier, Subscription};
use futures::{stream::StreamExt, SinkExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::extractors::CorrelationId;

/// Frames queued for the socket writer.
const OUTBOUND_BUFFER: usize = 32;

/// Message sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Listen to a shop's or a client's orders.
    Subscribe(SubscribeRequest),
    /// Keep-alive.
    Ping,
}

/// Body of a `subscribe` message. Exactly one field must be set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    /// Shop to follow.
    pub shop_id: Option<ShopId>,
    /// Client to follow.
    pub client_id: Option<ClientId>,
}

impl SubscribeRequest {
    /// Resolve the request into a notifier interest.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when both or neither id is
    /// given, or the id is blank.
    pub fn interest(self) -> Result<Interest, &'static str> {
        match (self.shop_id, self.client_id) {
            (Some(shop_id), None) if !shop_id.is_blank() => Ok(Interest::Shop(shop_id)),
            (None, Some(client_id)) if !client_id.is_blank() => Ok(Interest::Client(client_id)),
            (Some(_), Some(_)) => Err("subscribe with either shopId or clientId, not both"),
            (None, None) => Err("subscribe requires shopId or clientId"),
            _ => Err("subscription id must not be blank"),
        }
    }
}

/// Control message sent by the server. Order events are sent as
/// serialized [`bookstore_core::OrderEvent`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Subscription accepted.
    Subscribed {
        /// Shop being followed.
        #[serde(rename = "shopId", skip_serializing_if = "Option::is_none")]
        shop_id: Option<ShopId>,
        /// Client being followed.
        #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
        client_id: Option<ClientId>,
    },
    /// The last client message was rejected, or the subscription ended.
    Error {
        /// Error description
        message: String,
    },
    /// Reply to a ping.
    Pong,
}

impl ServerMessage {
    fn subscribed(interest: &Interest) -> Self {
        match interest {
            Interest::Shop(shop_id) => Self::Subscribed {
                shop_id: Some(shop_id.clone()),
                client_id: None,
            },
            Interest::Client(client_id) => Self::Subscribed {
                shop_id: None,
                client_id: Some(client_id.clone()),
            },
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// WebSocket upgrade handler.
///
/// The connection outlives the upgrade request, so its tasks run in their
/// own `websocket` span carrying the request's correlation id.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .route("/ws/orders", get(websocket::handle))
///     .with_state(app_state);
/// ```
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(
    ws: WebSocketUpgrade,
    State(notifier): State<Notifier>,
    correlation_id: CorrelationId,
) -> Response {
    let span = info_span!("websocket", %correlation_id);
    ws.on_upgrade(move |socket| handle_socket(socket, notifier).instrument(span))
}

/// Serialize and queue a frame. Returns `false` once the writer is gone.
async fn push(outbound: &mpsc::Sender<Message>, message: &impl Serialize) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => outbound.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize websocket frame");
            true
        }
    }
}

/// Task relaying one subscription's events to the socket writer.
///
/// Dropping it aborts the task, which drops the [`Subscription`] and
/// unsubscribes.
struct Forwarder(JoinHandle<()>);

impl Forwarder {
    fn spawn(mut subscription: Subscription, outbound: mpsc::Sender<Message>) -> Self {
        Self(tokio::spawn(
            async move {
                while let Some(event) = subscription.recv().await {
                    if !push(&outbound, &event).await {
                        return;
                    }
                }

                debug!(subscription = %subscription.id(), "Subscription dropped by notifier");
                push(
                    &outbound,
                    &ServerMessage::error("subscription closed; subscribe again"),
                )
                .await;
            }
            .in_current_span(),
        ))
    }
}

impl Drop for Forwarder {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle WebSocket connection lifecycle.
///
/// Two tasks run concurrently:
/// 1. **Sender**: drains queued frames into the socket
/// 2. **Receiver**: processes client messages and owns the current
///    subscription
///
/// When either finishes the other is aborted.
async fn handle_socket(socket: WebSocket, notifier: Notifier) {
    info!("WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut queued) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    let mut send_task = tokio::spawn(
        async move {
            while let Some(message) = queued.recv().await {
                if sender.send(message).await.is_err() {
                    break;
                }
            }

            debug!("WebSocket send task terminated");
        }
        .in_current_span(),
    );

    let mut recv_task = tokio::spawn(async move {
        let mut forwarder: Option<Forwarder> = None;

        while let Some(Ok(msg)) = receiver.next().await {
            let reply = match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Subscribe(request)) => match request.interest() {
                        Ok(interest) => {
                            // Unsubscribe before registering the new interest.
                            forwarder = None;
                            match notifier.subscribe(interest.clone()).await {
                                Ok(subscription) => {
                                    info!(%interest, subscription = %subscription.id(), "WebSocket subscribed");
                                    if !push(&outbound, &ServerMessage::subscribed(&interest)).await {
                                        break;
                                    }
                                    forwarder = Some(Forwarder::spawn(subscription, outbound.clone()));
                                    continue;
                                }
                                Err(e) => {
                                    warn!(error = %e, "Notifier unavailable");
                                    ServerMessage::error("notifications are unavailable")
                                }
                            }
                        }
                        Err(reason) => ServerMessage::error(reason),
                    },
                    Ok(ClientMessage::Ping) => ServerMessage::Pong,
                    Err(e) => {
                        debug!(error = %e, "Invalid websocket message");
                        ServerMessage::error(format!("invalid message: {e}"))
                    }
                },
                Message::Binary(_) => ServerMessage::error("binary frames are not supported"),
                Message::Close(_) => {
                    debug!("Client requested close");
                    break;
                }
                // Axum answers protocol pings itself
                Message::Ping(_) | Message::Pong(_) => continue,
            };

            if !push(&outbound, &reply).await {
                break;
            }
        }

        drop(forwarder);
        debug!("WebSocket receive task terminated");
    }
    .in_current_span());

    tokio::select! {
        _ = (&mut send_task) => {
            debug!("Send task completed, aborting receive task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            debug!("Receive task completed, aborting send task");
            send_task.abort();
        },
    }

    info!("WebSocket connection closed");
}
