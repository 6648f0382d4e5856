//! Dirshare Socket Server
//!
//! A WebSocket server that exposes one directory: clients can list it and
//! ask for a filtered zip of it to be uploaded somewhere.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DIRSHARE SOCKET SERVER                           │
//! │                 Single root directory, many clients                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  lifecycle::start ──► bind_with_retry (9462..=9466) ──► accept loop     │
//! │                                                                         │
//! │  accept loop ──► handle_connection per client (tokio task)              │
//! │    - Handshake + origin policy                                          │
//! │    - Frames handled in receipt order                                    │
//! │                                                                         │
//! │  RequestHandler (Arc, shared, immutable)                                │
//! │    listFiles        ──► tree::build_tree          (spawn_blocking)      │
//! │    zipAndSendFiles  ──► archive::build_archive    (spawn_blocking)      │
//! │                         └─► UploadSink::deliver                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol
//!
//! All messages are JSON over WebSocket:
//!
//! ```json
//! // Client -> Server
//! {"action": "listFiles"}
//! {"action": "zipAndSendFiles", "payload": {"presigned_url": "https://...", "skip_file_paths": ["contracts/ignore.sol"]}}
//!
//! // Server -> Client
//! {"type": "folderStructure", "tree": {...}}
//! {"type": "uploadStatus", "success": true}
//! {"type": "error", "error": "presigned_url missing"}
//! ```

pub mod connection;
pub mod handler;
pub mod lifecycle;
pub mod origin;
pub mod protocol;

pub use connection::handle_connection;
pub use handler::{ConnectionContext, RequestHandler};
pub use lifecycle::{bind_with_retry, serve, start, LocalServer};
pub use origin::OriginPolicy;
pub use protocol::{parse_request, ClientRequest, ServerMessage, ZipPayload};
