use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use sysfeed::core::monitor::{Publisher, UPDATE_EVENT};
use sysfeed::server::{http::LIVENESS_BODY, SubscriberRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn start_registry() -> (Arc<SubscriberRegistry>, String, broadcast::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = Arc::new(SubscriberRegistry::new(8));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::spawn(Arc::clone(&registry).serve(listener, shutdown_rx));

    (registry, addr.to_string(), shutdown_tx)
}

async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.subscriber_count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("observer never attached");
}

async fn next_text<S>(stream: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("no frame received")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn http_get(addr: &str, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n\r\n", path, addr);
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_observer_receives_update_envelope() {
    let (registry, addr, _shutdown) = start_registry().await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    wait_for_subscribers(&registry, 1).await;

    registry
        .publish(UPDATE_EVENT, &json!({ "cpu": { "usage": 12.5 } }))
        .unwrap();

    let frame = next_text(&mut ws).await;
    assert_eq!(frame["event"], "update_metrics");
    assert_eq!(frame["data"]["cpu"]["usage"], 12.5);
}

#[tokio::test]
async fn test_every_observer_gets_the_frame() {
    let (registry, addr, _shutdown) = start_registry().await;

    let (mut first, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    let (mut second, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    wait_for_subscribers(&registry, 2).await;

    registry.publish(UPDATE_EVENT, &json!({ "n": 1 })).unwrap();

    assert_eq!(next_text(&mut first).await["data"]["n"], 1);
    assert_eq!(next_text(&mut second).await["data"]["n"], 1);
}

#[tokio::test]
async fn test_late_observer_sees_only_new_frames() {
    let (registry, addr, _shutdown) = start_registry().await;

    registry.publish(UPDATE_EVENT, &json!({ "n": 1 })).unwrap();

    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    wait_for_subscribers(&registry, 1).await;

    registry.publish(UPDATE_EVENT, &json!({ "n": 2 })).unwrap();
    assert_eq!(next_text(&mut ws).await["data"]["n"], 2);
}

#[tokio::test]
async fn test_disconnect_detaches_observer() {
    let (registry, addr, _shutdown) = start_registry().await;

    let (mut ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    wait_for_subscribers(&registry, 1).await;

    ws.close(None).await.unwrap();
    drop(ws);

    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("observer never detached");

    // publishing with nobody attached is still fine
    assert!(registry.publish(UPDATE_EVENT, &json!({})).is_ok());
}

#[tokio::test]
async fn test_liveness_endpoint() {
    let (_registry, addr, _shutdown) = start_registry().await;

    let response = http_get(&addr, "/").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with(LIVENESS_BODY));

    let response = http_get(&addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));

    let response = http_get(&addr, "/nope").await;
    assert!(response.starts_with("HTTP/1.1 404"));
}

#[tokio::test]
async fn test_shutdown_stops_serving() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let registry = Arc::new(SubscriberRegistry::default());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let task = tokio::spawn(Arc::clone(&registry).serve(listener, shutdown_rx));
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("registry did not stop")
        .unwrap();
    assert!(result.is_ok());
}
