//! WebSocket connection handler
//!
//! Performs the handshake (applying the origin policy), then feeds every
//! inbound frame through the [`RequestHandler`] and writes the responses back
//! on the same socket, one message at a time in receipt order.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message, WebSocketStream};

use crate::socket_server::handler::{ConnectionContext, RequestHandler};
use crate::socket_server::protocol::{ServerMessage, ORIGIN_NOT_ALLOWED};

/// Handle a single WebSocket connection
pub async fn handle_connection(stream: TcpStream, handler: Arc<RequestHandler>) {
    let peer = stream.peer_addr().ok();
    tracing::info!("New connection from {:?}", peer);

    let mut origin: Option<String> = None;
    let policy = handler.origin_policy().clone();
    let check_origin = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        origin = req
            .headers()
            .get("origin")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if policy.is_allowed(origin.as_deref()) {
            Ok(resp)
        } else {
            tracing::warn!("Connection from origin {:?} is not allowed", origin);
            let mut rejection = ErrorResponse::new(Some(ORIGIN_NOT_ALLOWED.to_string()));
            *rejection.status_mut() = StatusCode::FORBIDDEN;
            Err(rejection)
        }
    };

    let ws_stream = match accept_hdr_async(stream, check_origin).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let ctx = ConnectionContext { peer, origin };
    let mut conn = ConnectionState::new(ws_stream, handler, ctx);
    conn.run().await;

    tracing::info!("Connection closed from {:?}", peer);
}

/// State for a single connection
struct ConnectionState {
    ws: WebSocketStream<TcpStream>,
    handler: Arc<RequestHandler>,
    ctx: ConnectionContext,
}

impl ConnectionState {
    fn new(ws: WebSocketStream<TcpStream>, handler: Arc<RequestHandler>, ctx: ConnectionContext) -> Self {
        Self { ws, handler, ctx }
    }

    async fn run(&mut self) {
        while let Some(msg) = self.ws.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
                Ok(Message::Close(_)) => {
                    tracing::info!("Client {:?} requested close", self.ctx.peer);
                    break;
                }
                // Pings are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            let responses = self.handler.handle(&self.ctx, &text).await;
            for response in &responses {
                if let Err(e) = self.send(response).await {
                    // The client went away mid-request; nothing left to report to.
                    tracing::debug!("Dropping response to {:?}: {}", self.ctx.peer, e);
                    return;
                }
            }
        }
    }

    async fn send(&mut self, msg: &ServerMessage) -> anyhow::Result<()> {
        let json = serde_json::to_string(msg)?;
        self.ws.send(Message::Text(json)).await?;
        Ok(())
    }
}
