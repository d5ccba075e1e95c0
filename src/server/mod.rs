//! Subscriber registry: WebSocket fan-out plus the liveness endpoint.
//!
//! One TCP listener serves both. WebSocket upgrade requests become
//! observers that receive every frame published after they attach; any
//! other HTTP request gets the static liveness response.

pub mod http;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::core::monitor::Publisher;
use crate::error::{Result, SysfeedError};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Time allowed for a client to send its request head
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

type ConnectHandler = Box<dyn Fn(SocketAddr) + Send + Sync>;

/// Tracks connected observers and fans frames out to them
pub struct SubscriberRegistry {
    frames: broadcast::Sender<Arc<str>>,
    connect_handlers: RwLock<Vec<ConnectHandler>>,
}

impl SubscriberRegistry {
    /// `capacity` is how many frames a slow observer may fall behind
    /// before it starts skipping.
    pub fn new(capacity: usize) -> Self {
        let (frames, _) = broadcast::channel(capacity.max(1));
        Self {
            frames,
            connect_handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback fired whenever an observer attaches.
    pub fn on_connect<F>(&self, handler: F)
    where
        F: Fn(SocketAddr) + Send + Sync + 'static,
    {
        self.connect_handlers.write().push(Box::new(handler));
    }

    /// Number of currently attached observers
    pub fn subscriber_count(&self) -> usize {
        self.frames.receiver_count()
    }

    /// Accept connections until `shutdown` fires.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let connection_shutdown = shutdown.resubscribe();
        log::info!("Listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let registry = Arc::clone(&self);
                        let shutdown = connection_shutdown.resubscribe();
                        tokio::spawn(async move {
                            if let Err(e) = registry.handle_connection(stream, addr, shutdown).await {
                                log::debug!("Connection from {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => log::warn!("Failed to accept connection: {}", e),
                },
                _ = shutdown.recv() => break,
            }
        }

        log::info!("Subscriber registry stopped");
        Ok(())
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let upgrade = tokio::time::timeout(REQUEST_TIMEOUT, http::is_websocket_upgrade(&stream))
            .await
            .map_err(|_| SysfeedError::transport(format!("{} sent no request", addr)))??;

        if upgrade {
            self.serve_observer(stream, addr, shutdown).await
        } else {
            http::respond_liveness(stream).await?;
            Ok(())
        }
    }

    async fn serve_observer(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let ws = accept_async(stream)
            .await
            .map_err(|e| SysfeedError::transport(format!("handshake with {} failed: {}", addr, e)))?;
        let (mut sink, mut incoming) = ws.split();

        // Subscribe before notifying so the observer sees the next frame
        let mut frames = self.frames.subscribe();
        self.notify_connect(addr);

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Ok(frame) => {
                        if let Err(e) = sink.send(Message::text(frame.to_string())).await {
                            log::debug!("Dropping observer {}: {}", addr, e);
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::debug!("Observer {} lagged, skipped {} frames", addr, skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                message = incoming.next() => match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::debug!("Observer {} read error: {}", addr, e);
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        log::info!("Client disconnected: {}", addr);
        Ok(())
    }

    fn notify_connect(&self, addr: SocketAddr) {
        for handler in self.connect_handlers.read().iter() {
            handler(addr);
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Publisher for SubscriberRegistry {
    fn publish(&self, event: &str, payload: &serde_json::Value) -> Result<()> {
        let frame = serde_json::json!({ "event": event, "data": payload }).to_string();

        // An error only means nobody is listening right now
        if self.frames.send(Arc::from(frame)).is_err() {
            log::trace!("No observers for '{}'", event);
        }
        Ok(())
    }
}
