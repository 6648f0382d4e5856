//! Dirshare: expose one local directory over WebSocket
//!
//! A client connected to the server can ask for a selection-annotated
//! listing of the directory, and for a zip of it (minus the paths it chooses
//! to skip) to be uploaded to a presigned URL. Nothing outside the served
//! directory is ever listed or archived.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirshare::{config::ServerConfig, socket_server, upload::PresignedUrlSink};
//!
//! # async fn run() -> dirshare::Result<()> {
//! let config = ServerConfig::new("./contracts");
//! let server = socket_server::start(&config, Arc::new(PresignedUrlSink::new()?)).await?;
//! println!("ws://{}", server.local_addr());
//! server.close().await;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod fs_utils;
pub mod socket_server;
pub mod tree;
pub mod tunnel;
pub mod upload;
pub mod walk;

// Re-export commonly used types
pub use archive::{archive_and_deliver, build_archive, ExcludedPaths};
pub use config::ServerConfig;
pub use error::{DirshareError, Result};
pub use tree::{build_tree, DirectoryNode, FileEntry, SelectionPolicy};
pub use upload::{PresignedUrlSink, UploadSink, UploadTarget};
