//! Blocking SSH command transport with an async adapter.
//!
//! The blocking core mirrors the contract the rest of the platform relies
//! on: `connect` either authenticates or reports why not, `execute`
//! *always* returns a [`CommandOutput`] (a timeout, a dropped channel, or
//! an unauthenticated session all become structured failures), and
//! `disconnect` is idempotent.

use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ssh2::{CheckResult, KnownHostFileKind, Session};

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Credential used to authenticate against the node.
#[derive(Debug, Clone)]
pub enum SshAuth {
    /// Private key file. The only auth the hub accepts.
    KeyFile(PathBuf),
    /// Password sourced from environment configuration. Permitted for
    /// host-facing tooling, refused by the hub-facing constructor.
    Password(String),
}

/// How the remote host's key is verified during the handshake.
#[derive(Debug, Clone)]
pub enum HostKeyPolicy {
    /// Check the session host key against an OpenSSH-format known-hosts
    /// file. The secure default.
    KnownHosts(PathBuf),
    /// Accept any host key (trust-on-first-use). Must be opted into.
    AcceptAny,
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Self::KnownHosts(Path::new(&home).join(".ssh").join("known_hosts"))
    }
}

/// Connection parameters for a node.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
    pub host_key_policy: HostKeyPolicy,
}

/// Failure modes of `connect`. `execute` never returns these -- it folds
/// every failure into a [`CommandOutput`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    #[error("Authentication failed for {username}: {reason}")]
    Auth { username: String, reason: String },
}

/// Structured result of one remote command execution.
///
/// `success` means the command ran and exited 0. When the transport itself
/// failed (not connected, channel error, timeout), `success` is false,
/// `exit_code` is unset, and `error` carries the reason.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl CommandOutput {
    /// Output of a command that actually ran on the remote host.
    pub fn from_exec(stdout: String, stderr: String, exit_code: i32) -> Self {
        Self {
            success: exit_code == 0,
            stdout,
            stderr,
            exit_code: Some(exit_code),
            error: None,
        }
    }

    /// A transport-level failure; the command may never have run.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error: Some(reason.into()),
        }
    }
}

/// Blocking SSH client for one node.
///
/// Not reentrant-safe: one command at a time per instance. Async callers
/// go through [`AsyncSshClient`], which enforces that.
pub struct SshClient {
    config: SshConfig,
    session: Option<Session>,
}

impl SshClient {
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Establish and authenticate the SSH session.
    ///
    /// Host key verification runs before authentication, per the
    /// configured [`HostKeyPolicy`].
    pub fn connect(&mut self) -> Result<(), TransportError> {
        let addr = (self.config.host.as_str(), self.config.port);
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            host: self.config.host.clone(),
            port: self.config.port,
            reason: e.to_string(),
        })?;

        let mut session = Session::new().map_err(|e| TransportError::Connect {
            host: self.config.host.clone(),
            port: self.config.port,
            reason: e.to_string(),
        })?;
        session.set_tcp_stream(stream);
        session.handshake().map_err(|e| TransportError::Connect {
            host: self.config.host.clone(),
            port: self.config.port,
            reason: e.to_string(),
        })?;

        self.verify_host_key(&session)?;
        self.authenticate(&session)?;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            "SSH connection established",
        );
        self.session = Some(session);
        Ok(())
    }

    /// Close the session. Safe to call when not connected.
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            // Best-effort; the peer may already be gone.
            let _ = session.disconnect(None, "closing", None);
            tracing::info!(host = %self.config.host, "SSH connection closed");
        }
    }

    /// Run `command` on the node and capture its streams and exit code.
    ///
    /// Never returns an error: transport failures become a
    /// [`CommandOutput`] with `success = false` and `error` set.
    pub fn execute(&mut self, command: &str, timeout: Duration) -> CommandOutput {
        let Some(session) = self.session.as_ref() else {
            return CommandOutput::failure("not connected");
        };

        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);

        match exec_on_session(session, command) {
            Ok(output) => output,
            Err(reason) => {
                tracing::error!(error = %reason, "Remote command execution failed");
                // A failed channel usually means the session is unusable.
                CommandOutput::failure(reason)
            }
        }
    }

    fn verify_host_key(&self, session: &Session) -> Result<(), TransportError> {
        let path = match &self.config.host_key_policy {
            HostKeyPolicy::AcceptAny => {
                tracing::warn!(
                    host = %self.config.host,
                    "Host key verification disabled (AcceptAny policy)",
                );
                return Ok(());
            }
            HostKeyPolicy::KnownHosts(path) => path,
        };

        let host_key_err = |reason: String| TransportError::HostKey {
            host: self.config.host.clone(),
            reason,
        };

        let mut known_hosts = session
            .known_hosts()
            .map_err(|e| host_key_err(e.to_string()))?;
        known_hosts
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|e| host_key_err(format!("cannot read {}: {e}", path.display())))?;

        let (key, _key_type) = session
            .host_key()
            .ok_or_else(|| host_key_err("no host key presented".into()))?;

        match known_hosts.check_port(&self.config.host, self.config.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(host_key_err("host not present in known hosts".into())),
            CheckResult::Mismatch => Err(host_key_err(
                "host key mismatch -- possible man-in-the-middle".into(),
            )),
            CheckResult::Failure => Err(host_key_err("known hosts check failed".into())),
        }
    }

    fn authenticate(&self, session: &Session) -> Result<(), TransportError> {
        let auth_err = |reason: String| TransportError::Auth {
            username: self.config.username.clone(),
            reason,
        };

        match &self.config.auth {
            SshAuth::KeyFile(path) => {
                if !path.exists() {
                    return Err(auth_err(format!("key file {} not found", path.display())));
                }
                session
                    .userauth_pubkey_file(&self.config.username, None, path, None)
                    .map_err(|e| auth_err(e.to_string()))?;
            }
            SshAuth::Password(password) => {
                session
                    .userauth_password(&self.config.username, password)
                    .map_err(|e| auth_err(e.to_string()))?;
            }
        }

        if session.authenticated() {
            Ok(())
        } else {
            Err(auth_err("authentication incomplete".into()))
        }
    }
}

impl Drop for SshClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Open a channel, run the command, and collect streams + exit status.
///
/// Channel and stream failures both collapse to a reason string; the
/// caller folds it into a [`CommandOutput`].
fn exec_on_session(session: &Session, command: &str) -> Result<CommandOutput, String> {
    let mut channel = session.channel_session().map_err(|e| e.to_string())?;
    channel.exec(command).map_err(|e| e.to_string())?;

    let mut stdout = String::new();
    let mut stderr = String::new();
    channel
        .read_to_string(&mut stdout)
        .map_err(|e| format!("reading stdout: {e}"))?;
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|e| format!("reading stderr: {e}"))?;

    channel.wait_close().map_err(|e| e.to_string())?;
    let exit_code = channel.exit_status().map_err(|e| e.to_string())?;

    Ok(CommandOutput::from_exec(
        stdout.trim_end().to_string(),
        stderr.trim_end().to_string(),
        exit_code,
    ))
}

/// Async adapter over [`SshClient`].
///
/// The blocking client is not reentrant-safe, so all calls funnel through
/// one mutex: an async caller never starts a second concurrent invocation
/// on the same transport instance. The blocking work itself runs on the
/// tokio blocking pool.
#[derive(Clone)]
pub struct AsyncSshClient {
    inner: Arc<Mutex<SshClient>>,
}

impl AsyncSshClient {
    pub fn new(config: SshConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SshClient::new(config))),
        }
    }

    pub async fn connect(&self) -> Result<(), TransportError> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut client = inner.lock().expect("ssh client mutex poisoned");
            client.connect()
        })
        .await
        .unwrap_or_else(|e| {
            Err(TransportError::Connect {
                host: "<unknown>".into(),
                port: 0,
                reason: format!("blocking task failed: {e}"),
            })
        })
    }

    pub async fn disconnect(&self) {
        let inner = Arc::clone(&self.inner);
        let _ = tokio::task::spawn_blocking(move || {
            let mut client = inner.lock().expect("ssh client mutex poisoned");
            client.disconnect();
        })
        .await;
    }

    /// Execute with the default 30-second timeout.
    pub async fn execute(&self, command: String) -> CommandOutput {
        self.execute_with_timeout(command, DEFAULT_COMMAND_TIMEOUT)
            .await
    }

    pub async fn execute_with_timeout(&self, command: String, timeout: Duration) -> CommandOutput {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut client = inner.lock().expect("ssh client mutex poisoned");
            client.execute(&command, timeout)
        })
        .await
        .unwrap_or_else(|e| CommandOutput::failure(format!("blocking task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn test_config(auth: SshAuth) -> SshConfig {
        SshConfig {
            host: "127.0.0.1".into(),
            // Port 1 is reserved and never carries sshd.
            port: 1,
            username: "pi".into(),
            auth,
            host_key_policy: HostKeyPolicy::AcceptAny,
        }
    }

    #[test]
    fn execute_without_connect_is_a_structured_failure() {
        let mut client = SshClient::new(test_config(SshAuth::Password("secret".into())));
        let output = client.execute("echo hi", DEFAULT_COMMAND_TIMEOUT);
        assert!(!output.success);
        assert_eq!(output.exit_code, None);
        assert_eq!(output.error.as_deref(), Some("not connected"));
    }

    #[test]
    fn connect_to_dead_port_reports_connect_error() {
        let mut client = SshClient::new(test_config(SshAuth::Password("secret".into())));
        let err = client.connect().unwrap_err();
        assert_matches!(err, TransportError::Connect { port: 1, .. });
        assert!(!client.is_connected());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut client = SshClient::new(test_config(SshAuth::Password("secret".into())));
        client.disconnect();
        client.disconnect();
        assert!(!client.is_connected());
    }

    #[test]
    fn command_output_success_tracks_exit_code() {
        let ok = CommandOutput::from_exec("out".into(), String::new(), 0);
        assert!(ok.success);
        assert_eq!(ok.exit_code, Some(0));

        let failed = CommandOutput::from_exec(String::new(), "boom".into(), 17);
        assert!(!failed.success);
        assert_eq!(failed.exit_code, Some(17));
        assert!(failed.error.is_none());
    }

    #[tokio::test]
    async fn async_adapter_folds_connect_failure_into_error() {
        let client = AsyncSshClient::new(test_config(SshAuth::Password("secret".into())));
        let err = client.connect().await.unwrap_err();
        assert_matches!(err, TransportError::Connect { .. });

        // Unconnected execute still yields a structured failure.
        let output = client.execute("true".into()).await;
        assert!(!output.success);
        assert!(output.error.is_some());
    }

    #[test]
    fn default_host_key_policy_is_known_hosts() {
        assert_matches!(HostKeyPolicy::default(), HostKeyPolicy::KnownHosts(_));
    }
}
