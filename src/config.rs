//! Server configuration
//!
//! Everything here is fixed at startup and shared read-only by all
//! connections.

use std::path::PathBuf;

use crate::socket_server::origin::OriginPolicy;
use crate::tree::SelectionPolicy;

/// Port tried first when none is requested
pub const DEFAULT_PORT: u16 = 9462;

/// Ports tried (starting at the requested one) before giving up
pub const DEFAULT_PORT_ATTEMPTS: u16 = 5;

/// Interface the listener binds to by default
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Configuration for one local file server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory to serve; resolved to a canonical path at startup
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// An explicitly requested port is never swapped for another one
    pub port_explicit: bool,
    pub max_port_attempts: u16,
    pub selection: SelectionPolicy,
    pub origin_policy: OriginPolicy,
}

impl ServerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            port_explicit: false,
            max_port_attempts: DEFAULT_PORT_ATTEMPTS,
            selection: SelectionPolicy::default(),
            origin_policy: OriginPolicy::default(),
        }
    }

    /// Request a specific port. Bind conflicts then fail instead of retrying.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self.port_explicit = true;
        self
    }

    /// Start probing at `port`, moving on to the next ports on conflict.
    pub fn with_preferred_port(mut self, port: u16) -> Self {
        self.port = port;
        self.port_explicit = false;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_max_port_attempts(mut self, attempts: u16) -> Self {
        self.max_port_attempts = attempts;
        self
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origin_policy = policy;
        self
    }

    /// Last port that may be tried under the current settings
    pub fn port_ceiling(&self) -> u16 {
        if self.port_explicit {
            self.port
        } else {
            self.port
                .saturating_add(self.max_port_attempts.max(1) - 1)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
