//! Live server and WebSocket client helpers

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use dirshare::fs_utils::resolve_root;
use dirshare::socket_server::{serve, LocalServer, OriginPolicy, RequestHandler};
use dirshare::tree::SelectionPolicy;
use dirshare::{DirshareError, UploadSink, UploadTarget};

/// Sink that keeps archives in memory. Targets containing `reject` fail.
#[derive(Default)]
pub struct RecordingSink {
    uploads: Mutex<Vec<(Vec<u8>, String)>>,
}

impl RecordingSink {
    /// Archives received so far, with the target they were sent to
    pub fn uploads(&self) -> Vec<(Vec<u8>, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadSink for RecordingSink {
    async fn deliver(&self, archive: Vec<u8>, target: &UploadTarget) -> dirshare::Result<()> {
        if target.as_str().contains("reject") {
            return Err(DirshareError::Upload {
                message: "upload rejected with status 403".into(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((archive, target.as_str().to_string()));
        Ok(())
    }
}

/// Serve `root` on an ephemeral localhost port with a recording sink
pub async fn spawn_server(root: &Path, policy: OriginPolicy) -> (LocalServer, Arc<RecordingSink>) {
    let root = resolve_root(root).expect("root should resolve");
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .expect("Failed to bind");
    let sink = Arc::new(RecordingSink::default());
    let handler = Arc::new(RequestHandler::new(
        root,
        SelectionPolicy::default(),
        policy,
        sink.clone(),
    ));
    let server = serve(listener, handler).expect("Failed to start server");
    (server, sink)
}

/// JSON-speaking WebSocket client
pub struct WsClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self::connect_with_origin(addr, None)
            .await
            .expect("Failed to connect")
    }

    /// Connect, sending `Origin: <origin>` in the handshake when given
    pub async fn connect_with_origin(
        addr: SocketAddr,
        origin: Option<&str>,
    ) -> Result<Self, tungstenite::Error> {
        let mut request = format!("ws://{}", addr).into_client_request()?;
        if let Some(origin) = origin {
            request
                .headers_mut()
                .insert("Origin", HeaderValue::from_str(origin).unwrap());
        }
        let (ws, _) = connect_async(request).await?;
        Ok(Self { ws })
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .expect("Failed to send");
    }

    pub async fn send_json(&mut self, value: &Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn send_ping(&mut self, data: &[u8]) {
        self.ws
            .send(Message::Ping(data.to_vec()))
            .await
            .expect("Failed to send ping");
    }

    /// Next frame of any kind; panics after 10 seconds of silence
    pub async fn recv_frame(&mut self) -> Message {
        tokio::time::timeout(Duration::from_secs(10), self.ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .expect("WebSocket error")
    }

    /// Next text frame parsed as JSON; panics after 10 seconds of silence
    pub async fn recv_json(&mut self) -> Value {
        loop {
            if let Message::Text(text) = self.recv_frame().await {
                return serde_json::from_str(&text).expect("Server sent invalid JSON");
            }
        }
    }

    /// Send a request and collect responses up to and including `uploadStatus`
    pub async fn zip(&mut self, payload: Value) -> Vec<Value> {
        self.send_json(&serde_json::json!({"action": "zipAndSendFiles", "payload": payload}))
            .await;
        let mut messages = Vec::new();
        loop {
            let msg = self.recv_json().await;
            let done = msg["type"] == "uploadStatus";
            messages.push(msg);
            if done {
                return messages;
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
