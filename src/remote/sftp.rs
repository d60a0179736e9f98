//! SFTP session wrapper using libssh2
//!
//! Each `SftpSession` owns one SSH connection with one SFTP channel. It is
//! Send, so a worker thread can own it, but workers never share a session.
//!
//! Key considerations:
//! - One session per worker thread
//! - RAII cleanup (SFTP channel closed, then SSH disconnect, on drop)
//! - Only public-key authentication; key material is provisioned externally

use crate::error::{RemoteError, RemoteResult};
use crate::remote::types::{EntryKind, RemoteEntry};
use crate::remote::{Connector, RemoteSource};
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// libssh2 SFTP status codes the walker distinguishes
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;
const FX_NO_SUCH_PATH: i32 = 10;

/// Where and as whom to connect
#[derive(Clone, PartialEq, Eq)]
pub struct SftpTarget {
    /// Server hostname or IP
    pub host: String,

    /// SSH port (usually 22)
    pub port: u16,

    /// Login name
    pub username: String,

    /// Private key file
    pub key_path: PathBuf,

    /// Passphrase for the private key, if encrypted
    pub passphrase: Option<String>,
}

impl SftpTarget {
    /// Format as `sftp://user@host:port` for display
    pub fn to_display_string(&self) -> String {
        format!("sftp://{}@{}:{}", self.username, self.host, self.port)
    }
}

impl fmt::Debug for SftpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("key_path", &self.key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Open SFTP session
pub struct SftpSession {
    session: Session,

    /// SFTP channel; None once closed
    sftp: Option<Sftp>,

    server: String,
}

impl SftpSession {
    /// Connect, handshake, authenticate and open the SFTP channel
    pub fn connect_to(target: &SftpTarget, timeout: Duration) -> RemoteResult<Self> {
        let server = format!("{}:{}", target.host, target.port);
        let connection_failed = |reason: String| RemoteError::ConnectionFailed {
            server: server.clone(),
            reason,
        };

        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| connection_failed(format!("address resolution failed: {}", e)))?
            .next()
            .ok_or_else(|| connection_failed("host resolved to no addresses".into()))?;

        let tcp = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| connection_failed(e.to_string()))?;

        let mut session = Session::new().map_err(|e| connection_failed(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        session
            .handshake()
            .map_err(|e| connection_failed(format!("handshake failed: {}", e)))?;

        session
            .userauth_pubkey_file(
                &target.username,
                None,
                &target.key_path,
                target.passphrase.as_deref(),
            )
            .map_err(|e| RemoteError::AuthFailed {
                username: target.username.clone(),
                reason: e.message().to_string(),
            })?;

        if !session.authenticated() {
            return Err(RemoteError::AuthFailed {
                username: target.username.clone(),
                reason: "server did not accept the key".into(),
            });
        }

        let sftp = session
            .sftp()
            .map_err(|e| connection_failed(format!("SFTP subsystem unavailable: {}", e)))?;

        Ok(Self {
            session,
            sftp: Some(sftp),
            server,
        })
    }

    /// Get the server we're connected to
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Check if the SFTP channel is open
    pub fn is_connected(&self) -> bool {
        self.sftp.is_some()
    }
}

impl RemoteSource for SftpSession {
    fn list(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let sftp = self.sftp.as_ref().ok_or_else(|| RemoteError::SessionLost {
            reason: "session already closed".into(),
        })?;

        let listing = sftp
            .readdir(Path::new(path))
            .map_err(|e| translate_error(path, &e))?;

        Ok(listing
            .into_iter()
            .filter_map(|(child, stat)| {
                let name = child.file_name()?.to_string_lossy().into_owned();
                let entry = convert_stat(name, &stat);
                (!entry.is_special()).then_some(entry)
            })
            .collect())
    }

    fn close(&mut self) -> RemoteResult<()> {
        if let Some(sftp) = self.sftp.take() {
            drop(sftp);
            self.session
                .disconnect(None, "catalogue crawl finished", None)
                .map_err(|e| RemoteError::SessionLost {
                    reason: e.message().to_string(),
                })?;
            debug!(server = %self.server, "SFTP session closed");
        }
        Ok(())
    }
}

impl Drop for SftpSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn convert_stat(name: String, stat: &FileStat) -> RemoteEntry {
    let kind = match stat.perm {
        Some(mode) => EntryKind::from_mode(mode),
        None if stat.is_dir() => EntryKind::Directory,
        None if stat.is_file() => EntryKind::File,
        None => EntryKind::Other,
    };

    RemoteEntry {
        name,
        kind,
        size: stat.size,
        mtime: stat.mtime.map(|t| t as i64),
    }
}

fn translate_error(path: &str, err: &ssh2::Error) -> RemoteError {
    match err.code() {
        ErrorCode::SFTP(code) => sftp_status_error(path, code, err.message()),
        ErrorCode::Session(_) => RemoteError::SessionLost {
            reason: format!("while listing '{}': {}", path, err.message()),
        },
    }
}

/// Map an SFTP status code to the walker's error taxonomy
pub(crate) fn sftp_status_error(path: &str, code: i32, message: &str) -> RemoteError {
    match code {
        FX_NO_SUCH_FILE | FX_NO_SUCH_PATH => RemoteError::NotFound { path: path.into() },
        FX_PERMISSION_DENIED => RemoteError::PermissionDenied { path: path.into() },
        _ => RemoteError::Protocol {
            path: path.into(),
            code,
            message: message.into(),
        },
    }
}

/// Builder for SFTP sessions with retry support
pub struct SftpSessionBuilder {
    target: SftpTarget,
    timeout: Duration,
    retries: u32,
}

impl SftpSessionBuilder {
    /// Create a new builder
    pub fn new(target: SftpTarget) -> Self {
        Self {
            target,
            timeout: Duration::from_secs(30),
            retries: 3,
        }
    }

    /// Set connection and per-operation timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Build and connect with retries
    ///
    /// Authentication failures are not retried.
    pub fn connect(&self) -> RemoteResult<SftpSession> {
        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms, 400ms, ...
                let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(10)));
                std::thread::sleep(delay);
            }

            match SftpSession::connect_to(&self.target, self.timeout) {
                Ok(session) => {
                    info!(server = %session.server(), attempt, "SFTP session established");
                    return Ok(session);
                }
                Err(e @ RemoteError::AuthFailed { .. }) => return Err(e),
                Err(e) => {
                    debug!(attempt, error = %e, "SFTP connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RemoteError::ConnectionFailed {
            server: self.target.host.clone(),
            reason: "Connection failed after all retries".into(),
        }))
    }
}

/// Connector opening one `SftpSession` per worker
pub struct SftpConnector {
    builder: SftpSessionBuilder,
}

impl SftpConnector {
    pub fn new(target: SftpTarget, timeout: Duration, retries: u32) -> Self {
        Self {
            builder: SftpSessionBuilder::new(target).timeout(timeout).retries(retries),
        }
    }
}

impl Connector for SftpConnector {
    type Source = SftpSession;

    fn connect(&self) -> RemoteResult<SftpSession> {
        self.builder.connect()
    }

    fn describe(&self) -> String {
        self.builder.target.to_display_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SftpTarget {
        SftpTarget {
            host: "bulk.example.org".into(),
            port: 22,
            username: "crawler".into(),
            key_path: PathBuf::from("/keys/id_rsa"),
            passphrase: Some("hunter2".into()),
        }
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            sftp_status_error("/free/x", 2, "no such file"),
            RemoteError::NotFound {
                path: "/free/x".into()
            }
        );
        assert_eq!(
            sftp_status_error("/free/x", 10, "no such path"),
            RemoteError::NotFound {
                path: "/free/x".into()
            }
        );
        assert!(matches!(
            sftp_status_error("/free/x", 3, "denied"),
            RemoteError::PermissionDenied { .. }
        ));
        assert!(matches!(
            sftp_status_error("/free/x", 4, "failure"),
            RemoteError::Protocol { code: 4, .. }
        ));
    }

    #[test]
    fn test_convert_stat_prefers_mode_bits() {
        let stat = FileStat {
            size: Some(512),
            uid: None,
            gid: None,
            perm: Some(0o100644),
            atime: None,
            mtime: Some(1_700_000_000),
        };
        let entry = convert_stat("a.csv".into(), &stat);
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, Some(512));
        assert_eq!(entry.mtime, Some(1_700_000_000));

        let dir = FileStat {
            perm: Some(0o040755),
            ..stat
        };
        assert_eq!(convert_stat("d".into(), &dir).kind, EntryKind::Directory);
    }

    #[test]
    fn test_target_debug_redacts_passphrase() {
        let rendered = format!("{:?}", target());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
        assert_eq!(target().to_display_string(), "sftp://crawler@bulk.example.org:22");
    }

    #[test]
    fn test_connect_refused_reports_connection_error() {
        let mut t = target();
        t.host = "127.0.0.1".into();
        t.port = 1;
        let err = SftpSessionBuilder::new(t)
            .timeout(Duration::from_millis(200))
            .retries(0)
            .connect()
            .err()
            .unwrap();
        assert!(err.is_connection_error());
    }
}
