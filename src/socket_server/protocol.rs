//! Socket server protocol message types
//!
//! Defines the JSON message format for client-server communication.
//! Requests are `{"action": ..., "payload": {...}}`; responses are tagged by
//! `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tree::DirectoryNode;
use crate::{DirshareError, Result};

pub const INVALID_JSON: &str = "Invalid JSON message";
pub const UNKNOWN_ACTION: &str = "Unknown action";
pub const PRESIGNED_URL_MISSING: &str = "presigned_url missing";
pub const ORIGIN_NOT_ALLOWED: &str = "origin not allowed";

/// Client-to-server request
#[derive(Debug, Clone, PartialEq)]
pub enum ClientRequest {
    /// List the served directory
    ListFiles,
    /// Archive the served directory and upload it
    ZipAndSendFiles(ZipPayload),
    /// Any other action, or none at all
    Unknown(Option<String>),
}

/// Payload of `zipAndSendFiles`
///
/// Fields are read leniently so that a missing `presigned_url` is reported
/// as such even when other fields are malformed. `skip_file_paths` is kept
/// raw and only validated once an upload is actually attempted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZipPayload {
    pub presigned_url: Option<String>,
    pub skip_file_paths: Value,
    /// Origin claimed by the page driving the upload
    pub origin: Option<String>,
}

impl ZipPayload {
    /// Read the payload of a request. Anything that is not an object reads
    /// as an empty payload.
    pub fn from_value(payload: Option<&Value>) -> Self {
        let field = |name: &str| payload.and_then(|p| p.get(name));
        let string = |name: &str| field(name).and_then(Value::as_str).map(str::to_string);

        Self {
            presigned_url: string("presigned_url"),
            skip_file_paths: field("skip_file_paths").cloned().unwrap_or(Value::Null),
            origin: string("origin"),
        }
    }

    /// Upload destination, treating an empty string as absent
    pub fn presigned_url(&self) -> Option<&str> {
        self.presigned_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Paths to leave out of the archive.
    ///
    /// # Errors
    ///
    /// `Protocol` with an `Invalid payload` message unless the field is
    /// absent, `null`, or an array of strings.
    pub fn skip_file_paths(&self) -> Result<Vec<String>> {
        if self.skip_file_paths.is_null() {
            return Ok(Vec::new());
        }
        Vec::<String>::deserialize(&self.skip_file_paths).map_err(|e| DirshareError::Protocol {
            message: format!("Invalid payload: skip_file_paths: {}", e),
        })
    }
}

/// Server-to-client message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Directory listing
    FolderStructure { tree: DirectoryNode },
    /// Outcome of an archive upload
    UploadStatus { success: bool },
    /// Error response
    Error { error: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Error response for a failed request. Protocol errors carry their
    /// message verbatim so clients can match on it.
    pub fn from_error(err: &DirshareError) -> Self {
        match err {
            DirshareError::Protocol { message } => Self::error(message.clone()),
            other => Self::error(other.to_string()),
        }
    }
}

/// Parse one inbound text frame.
///
/// # Errors
///
/// `Protocol` with [`INVALID_JSON`] when the text is not JSON. Payload
/// problems surface later, see [`ZipPayload::skip_file_paths`].
pub fn parse_request(text: &str) -> Result<ClientRequest> {
    let value: Value = serde_json::from_str(text).map_err(|_| DirshareError::Protocol {
        message: INVALID_JSON.to_string(),
    })?;

    let action = value.get("action").and_then(Value::as_str);
    match action {
        Some("listFiles") => Ok(ClientRequest::ListFiles),
        Some("zipAndSendFiles") => Ok(ClientRequest::ZipAndSendFiles(ZipPayload::from_value(
            value.get("payload"),
        ))),
        other => Ok(ClientRequest::Unknown(other.map(str::to_string))),
    }
}
