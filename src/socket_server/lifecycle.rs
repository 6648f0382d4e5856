//! Listener binding and the accept loop
//!
//! A server is started with [`start`] and stopped with [`LocalServer::close`].
//! Closing drops the listener right away; connections already accepted keep
//! running until their clients disconnect.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::fs_utils::resolve_root;
use crate::socket_server::connection::handle_connection;
use crate::socket_server::handler::RequestHandler;
use crate::upload::UploadSink;
use crate::{DirshareError, Result};

/// Pause after a failed `accept` before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bind `host:port`, moving to the next port when it is taken.
///
/// Retries only happen for `AddrInUse` and only when the port was not
/// explicitly requested. At most `max_attempts` ports are tried.
pub async fn bind_with_retry(
    host: &str,
    port: u16,
    explicit: bool,
    max_attempts: u16,
) -> Result<TcpListener> {
    let attempts = if explicit { 1 } else { max_attempts.max(1) };
    let mut last = port;

    for offset in 0..attempts {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        last = candidate;

        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::info!("Port {} was busy, bound {} instead", port, candidate);
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && !explicit => {
                tracing::debug!("Port {} in use, trying next", candidate);
            }
            Err(e) => {
                return Err(DirshareError::Bind {
                    port: candidate,
                    source: e,
                })
            }
        }
    }

    Err(DirshareError::PortsExhausted { first: port, last })
}

/// Handle to a running server
pub struct LocalServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    accept_loop: JoinHandle<()>,
}

impl LocalServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Stop accepting connections and release the listening socket.
    ///
    /// In-flight requests on existing connections are not awaited.
    pub async fn close(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.accept_loop.await {
            tracing::error!("Accept loop ended abnormally: {}", e);
        }
        tracing::info!("Server on {} closed", self.local_addr);
    }
}

/// Resolve the root, bind a port per `config`, and start accepting.
pub async fn start(config: &ServerConfig, sink: Arc<dyn UploadSink>) -> Result<LocalServer> {
    let root = resolve_root(&config.root)?;
    tracing::debug!(
        "Binding {}:{} (ceiling {})",
        config.host,
        config.port,
        config.port_ceiling()
    );
    let listener = bind_with_retry(
        &config.host,
        config.port,
        config.port_explicit,
        config.max_port_attempts,
    )
    .await?;

    tracing::info!("Serving directory: {}", root.display());
    let handler = Arc::new(RequestHandler::new(
        root,
        config.selection.clone(),
        config.origin_policy.clone(),
        sink,
    ));
    serve(listener, handler)
}

/// Run the accept loop on an already bound listener.
pub fn serve(listener: TcpListener, handler: Arc<RequestHandler>) -> Result<LocalServer> {
    let local_addr = listener.local_addr()?;
    let (shutdown, mut shutdown_rx) = oneshot::channel::<()>();
    tracing::info!("Listening on ws://{}", local_addr);

    let accept_loop = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        tracing::debug!("Accepted connection from {}", addr);
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            handle_connection(stream, handler).await;
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                        // Errors like EMFILE persist until a descriptor frees up
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }
    });

    Ok(LocalServer {
        local_addr,
        shutdown,
        accept_loop,
    })
}
