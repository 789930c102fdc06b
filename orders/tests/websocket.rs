//! End-to-end tests of the order notification socket over a real listener.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use bookstore_orders::order_router;
use bookstore_runtime::{Notifier, NotifierConfig, OrderService};
use bookstore_testing::{helpers, InMemoryOrderStore};
use bookstore_web::{AppState, CORRELATION_ID_HEADER};
use bookstore_core::environment::SystemClock;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Test Fixtures
// ============================================================================

async fn spawn_server() -> (SocketAddr, OrderService) {
    let service = OrderService::new(
        Arc::new(InMemoryOrderStore::new()),
        Notifier::spawn(NotifierConfig::default()),
        Arc::new(SystemClock),
    );
    let app = order_router(AppState::new(service.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, service)
}

async fn connect(addr: SocketAddr) -> Socket {
    let (socket, _) = connect_async(format!("ws://{addr}/ws/orders"))
        .await
        .expect("websocket handshake");
    socket
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("websocket error");

        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn wait_for_subscribers(service: &OrderService, expected: usize) {
    for _ in 0..100 {
        if service.notifier().subscriber_count().await.unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscriber count never reached {expected}");
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn shop_subscriber_receives_its_orders() {
    let (addr, service) = spawn_server().await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"type": "subscribe", "shopId": "s1"})).await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "subscribed", "shopId": "s1"})
    );

    service.place_order(helpers::draft("s2", "c1")).await.unwrap();
    let placed = service.place_order(helpers::draft("s1", "c1")).await.unwrap();

    let created = next_json(&mut socket).await;
    assert_eq!(created["type"], "OrderCreated");
    assert_eq!(created["order"]["id"], placed.value.id.to_string());
    assert_eq!(created["order"]["total"], 50);

    service
        .update_order(
            placed.value.id,
            helpers::draft_with_lines("s1", "c1", vec![helpers::line(3, 1, 7)]),
        )
        .await
        .unwrap();

    let updated = next_json(&mut socket).await;
    assert_eq!(updated["type"], "OrderUpdated");
    assert_eq!(updated["order"]["total"], 7);
}

#[tokio::test]
async fn client_subscriber_receives_across_shops() {
    let (addr, service) = spawn_server().await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"type": "subscribe", "clientId": "c9"})).await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "subscribed", "clientId": "c9"})
    );

    service.place_order(helpers::draft("s1", "c1")).await.unwrap();
    service.place_order(helpers::draft("s2", "c9")).await.unwrap();

    let event = next_json(&mut socket).await;
    assert_eq!(event["order"]["shopId"], "s2");
    assert_eq!(event["order"]["clientId"], "c9");
}

#[tokio::test]
async fn invalid_messages_get_an_error_frame() {
    let (addr, _service) = spawn_server().await;
    let mut socket = connect(addr).await;

    socket.send(Message::Text("{oops".to_string())).await.unwrap();
    assert_eq!(next_json(&mut socket).await["type"], "error");

    send_json(&mut socket, json!({"type": "subscribe"})).await;
    assert_eq!(next_json(&mut socket).await["type"], "error");

    send_json(&mut socket, json!({"type": "placeOrder", "shopId": "s1"})).await;
    assert_eq!(next_json(&mut socket).await["type"], "error");

    send_json(&mut socket, json!({"type": "subscribe", "shopId": "s1"})).await;
    assert_eq!(next_json(&mut socket).await["type"], "subscribed");
}

#[tokio::test]
async fn resubscribing_replaces_the_interest() {
    let (addr, service) = spawn_server().await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"type": "subscribe", "shopId": "s1"})).await;
    next_json(&mut socket).await;
    send_json(&mut socket, json!({"type": "subscribe", "shopId": "s2"})).await;
    assert_eq!(
        next_json(&mut socket).await,
        json!({"type": "subscribed", "shopId": "s2"})
    );
    wait_for_subscribers(&service, 1).await;

    service.place_order(helpers::draft("s1", "c1")).await.unwrap();
    service.place_order(helpers::draft("s2", "c1")).await.unwrap();

    let event = next_json(&mut socket).await;
    assert_eq!(event["order"]["shopId"], "s2");
}

#[tokio::test]
async fn disconnect_unsubscribes() {
    let (addr, service) = spawn_server().await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"type": "subscribe", "shopId": "s1"})).await;
    next_json(&mut socket).await;
    wait_for_subscribers(&service, 1).await;

    socket.close(None).await.unwrap();

    wait_for_subscribers(&service, 0).await;
}

#[tokio::test]
async fn ping_gets_pong() {
    let (addr, _service) = spawn_server().await;
    let mut socket = connect(addr).await;

    send_json(&mut socket, json!({"type": "ping"})).await;

    assert_eq!(next_json(&mut socket).await, json!({"type": "pong"}));
}

#[tokio::test]
async fn upgrade_keeps_the_callers_correlation_id() {
    let (addr, _service) = spawn_server().await;
    let id = "6f1c3c1e-8d4f-4a5b-9d2e-0c6a7b8e9f00";
    let mut request = format!("ws://{addr}/ws/orders")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert(CORRELATION_ID_HEADER, id.parse().unwrap());

    let (mut socket, response) = connect_async(request).await.unwrap();

    assert_eq!(response.headers()[CORRELATION_ID_HEADER], id);
    send_json(&mut socket, json!({"type": "ping"})).await;
    assert_eq!(next_json(&mut socket).await, json!({"type": "pong"}));
}
