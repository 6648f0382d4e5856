//! Request dispatch, independent of the socket
//!
//! [`RequestHandler::handle`] turns one inbound text frame into the messages
//! to send back. It never fails: every error becomes an `error` message so a
//! bad request cannot take down the connection or the server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::{archive_and_deliver, ExcludedPaths};
use crate::socket_server::origin::OriginPolicy;
use crate::socket_server::protocol::{
    parse_request, ClientRequest, ServerMessage, ZipPayload, ORIGIN_NOT_ALLOWED,
    PRESIGNED_URL_MISSING, UNKNOWN_ACTION,
};
use crate::tree::{build_tree, SelectionPolicy};
use crate::upload::{UploadSink, UploadTarget};
use crate::DirshareError;

/// What the server knows about a connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    pub peer: Option<SocketAddr>,
    /// `Origin` header from the WebSocket handshake
    pub origin: Option<String>,
}

/// Shared by every connection of one server
pub struct RequestHandler {
    root: PathBuf,
    selection: SelectionPolicy,
    origin_policy: OriginPolicy,
    sink: Arc<dyn UploadSink>,
}

impl RequestHandler {
    /// `root` must already be canonical.
    pub fn new(
        root: PathBuf,
        selection: SelectionPolicy,
        origin_policy: OriginPolicy,
        sink: Arc<dyn UploadSink>,
    ) -> Self {
        Self {
            root,
            selection,
            origin_policy,
            sink,
        }
    }

    pub fn origin_policy(&self) -> &OriginPolicy {
        &self.origin_policy
    }

    /// Handle one inbound message and return the responses, in order.
    pub async fn handle(&self, ctx: &ConnectionContext, text: &str) -> Vec<ServerMessage> {
        let request = match parse_request(text) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!("Rejected message from {:?}: {}", ctx.peer, e);
                return vec![ServerMessage::from_error(&e)];
            }
        };

        match request {
            ClientRequest::ListFiles => vec![self.list_files().await],
            ClientRequest::ZipAndSendFiles(payload) => self.zip_and_send(ctx, payload).await,
            ClientRequest::Unknown(action) => {
                tracing::debug!("Unknown action {:?} from {:?}", action, ctx.peer);
                vec![ServerMessage::error(UNKNOWN_ACTION)]
            }
        }
    }

    async fn list_files(&self) -> ServerMessage {
        let root = self.root.clone();
        let selection = self.selection.clone();
        let result = tokio::task::spawn_blocking(move || build_tree(&root, &selection))
            .await
            .unwrap_or_else(|e| {
                Err(DirshareError::Io(std::io::Error::other(format!(
                    "listing task failed: {}",
                    e
                ))))
            });

        match result {
            Ok(tree) => {
                tracing::info!("Listed {}", self.root.display());
                ServerMessage::FolderStructure { tree }
            }
            Err(e) => {
                tracing::warn!("Failed to build tree for '{}': {}", self.root.display(), e);
                ServerMessage::from_error(&e)
            }
        }
    }

    async fn zip_and_send(&self, ctx: &ConnectionContext, payload: ZipPayload) -> Vec<ServerMessage> {
        let origin = payload.origin.as_deref().or(ctx.origin.as_deref());
        if !self.origin_policy.is_allowed(origin) {
            tracing::warn!("Upload from origin {:?} is not allowed", origin);
            return vec![ServerMessage::error(ORIGIN_NOT_ALLOWED)];
        }

        let Some(url) = payload.presigned_url() else {
            return vec![ServerMessage::error(PRESIGNED_URL_MISSING)];
        };
        let skip_file_paths = match payload.skip_file_paths() {
            Ok(paths) => paths,
            Err(e) => {
                tracing::debug!("Rejected upload from {:?}: {}", ctx.peer, e);
                return vec![ServerMessage::from_error(&e)];
            }
        };
        let target = UploadTarget::new(url);
        let excluded = ExcludedPaths::new(skip_file_paths);
        tracing::info!(
            "Archiving {} ({} excluded paths) for {}",
            self.root.display(),
            excluded.len(),
            target.redacted()
        );

        let report =
            archive_and_deliver(self.root.clone(), excluded, &target, self.sink.as_ref()).await;

        let mut messages: Vec<ServerMessage> =
            report.warnings.into_iter().map(ServerMessage::error).collect();
        if let Some(err) = report.archive_error {
            messages.push(ServerMessage::error(err));
        }
        messages.push(ServerMessage::UploadStatus {
            success: report.success,
        });
        messages
    }
}
