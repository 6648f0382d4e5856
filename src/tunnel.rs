//! Public exposure of the local port through an external tunnel
//!
//! The tunnel itself is somebody else's service. [`CommandTunnelProvider`]
//! runs a tunnel client program (`lt` from localtunnel by default) and
//! reports the public URL it prints. A tunnel failing never takes the local
//! server down with it.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::{DirshareError, Result};

/// Program used when no tunnel command is configured
pub const DEFAULT_TUNNEL_COMMAND: &str = "lt";

/// An open tunnel
#[async_trait]
pub trait Tunnel: Send {
    fn public_url(&self) -> &str;

    async fn close(&mut self) -> Result<()>;
}

/// Opens tunnels to a local port
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    async fn open(&self, local_port: u16, subdomain: Option<&str>) -> Result<Box<dyn Tunnel>>;
}

/// Runs `<program> [args..] --port <port> [--subdomain <id>]` and waits for
/// it to print a URL
pub struct CommandTunnelProvider {
    program: String,
    args: Vec<String>,
    startup_timeout: Duration,
}

impl CommandTunnelProvider {
    /// Build from a command line such as `"lt"` or `"npx localtunnel"`.
    pub fn new(command: &str) -> Self {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .unwrap_or_else(|| DEFAULT_TUNNEL_COMMAND.to_string());
        Self {
            program,
            args: parts.collect(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for CommandTunnelProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TUNNEL_COMMAND)
    }
}

#[async_trait]
impl TunnelProvider for CommandTunnelProvider {
    async fn open(&self, local_port: u16, subdomain: Option<&str>) -> Result<Box<dyn Tunnel>> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--port")
            .arg(local_port.to_string());
        if let Some(id) = subdomain {
            command.arg("--subdomain").arg(id);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| DirshareError::Tunnel {
            message: format!("failed to start '{}': {}", self.program, e),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| DirshareError::Tunnel {
            message: "tunnel stdout unavailable".to_string(),
        })?;
        let mut lines = BufReader::new(stdout).lines();

        let url = tokio::time::timeout(self.startup_timeout, async {
            while let Some(line) = lines.next_line().await? {
                tracing::debug!("tunnel: {}", line);
                if let Some(url) = extract_url(&line) {
                    return Ok(Some(url));
                }
            }
            Ok::<_, std::io::Error>(None)
        })
        .await
        .map_err(|_| DirshareError::Tunnel {
            message: format!("no URL from '{}' within {:?}", self.program, self.startup_timeout),
        })??;

        let Some(url) = url else {
            return Err(DirshareError::Tunnel {
                message: format!("'{}' exited before reporting a URL", self.program),
            });
        };

        // Keep draining so the child never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!("tunnel: {}", line);
            }
        });

        Ok(Box::new(ChildTunnel { url, child }))
    }
}

/// First `http(s)://` token on a line, trailing punctuation removed
fn extract_url(line: &str) -> Option<String> {
    line.split_whitespace()
        .find(|word| word.starts_with("https://") || word.starts_with("http://"))
        .map(|word| word.trim_end_matches([',', '.', ';']).to_string())
}

/// Tunnel backed by a child process
struct ChildTunnel {
    url: String,
    child: Child,
}

#[async_trait]
impl Tunnel for ChildTunnel {
    fn public_url(&self) -> &str {
        &self.url
    }

    async fn close(&mut self) -> Result<()> {
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // Already exited
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(DirshareError::Tunnel {
                message: format!("failed to stop tunnel: {}", e),
            }),
        }
    }
}
