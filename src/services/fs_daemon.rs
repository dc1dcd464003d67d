//! One-way UDP control channel for the file server.
//!
//! Datagrams are plain text, `<command> [args...]`. Nothing is ever sent back;
//! bad or failing commands are logged and dropped.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio_util::sync::CancellationToken;

use crate::services::job_storage::{JobStorage, JobStorageError};

const MAX_DATAGRAM: usize = 65_507;

/// Pause after a failed receive so a persistent socket error cannot spin the loop.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsCommand {
    LockJobFolder(u32),
    UnlockJobFolder(u32),
    Shutdown,
}

impl FsCommand {
    pub fn parse(datagram: &[u8]) -> Result<Self, CommandError> {
        let text = std::str::from_utf8(datagram).map_err(|_| CommandError::NotUtf8)?;
        let mut words = text.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?;

        match name {
            "lock_job_folder" => Ok(FsCommand::LockJobFolder(job_number(
                "lock_job_folder",
                words.next(),
            )?)),
            "unlock_job_folder" => Ok(FsCommand::UnlockJobFolder(job_number(
                "unlock_job_folder",
                words.next(),
            )?)),
            "shutdown" => Ok(FsCommand::Shutdown),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FsCommand::LockJobFolder(_) => "lock_job_folder",
            FsCommand::UnlockJobFolder(_) => "unlock_job_folder",
            FsCommand::Shutdown => "shutdown",
        }
    }
}

fn job_number(command: &'static str, arg: Option<&str>) -> Result<u32, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(command))?;
    arg.parse()
        .map_err(|_| CommandError::InvalidJobNumber(arg.to_string()))
}

/// The wire form, e.g. `lock_job_folder 51234`.
impl fmt::Display for FsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsCommand::LockJobFolder(job) | FsCommand::UnlockJobFolder(job) => {
                write!(f, "{} {}", self.name(), job)
            }
            FsCommand::Shutdown => f.write_str(self.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty datagram")]
    Empty,

    #[error("Datagram is not valid UTF-8")]
    NotUtf8,

    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("{0} needs a job number")]
    MissingArgument(&'static str),

    #[error("Invalid job number: {0}")]
    InvalidJobNumber(String),
}

/// What became of one datagram.
#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    Applied(FsCommand),
    Rejected(CommandError),
    Failed { command: FsCommand, error: String },
}

impl CommandOutcome {
    fn label(&self) -> &'static str {
        match self {
            CommandOutcome::Applied(_) => "applied",
            CommandOutcome::Rejected(_) => "rejected",
            CommandOutcome::Failed { .. } => "failed",
        }
    }
}

pub struct FsDaemon {
    socket: UdpSocket,
    storage: JobStorage,
    shutdown: CancellationToken,
}

impl FsDaemon {
    pub async fn bind(addr: impl ToSocketAddrs, storage: JobStorage) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            storage,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Cancelling this token stops `run`; so does a `shutdown` datagram.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Receive and handle datagrams one at a time until shut down.
    pub async fn run(&self) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        tracing::info!(addr = ?self.socket.local_addr().ok(), "File server daemon listening");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        self.handle_datagram(&buf[..len], peer).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "UDP receive failed");
                        tokio::select! {
                            _ = self.shutdown.cancelled() => break,
                            _ = tokio::time::sleep(RECV_ERROR_BACKOFF) => {}
                        }
                    }
                },
            }
        }

        tracing::info!("File server daemon stopped");
    }

    pub async fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr) -> CommandOutcome {
        let outcome = match FsCommand::parse(datagram) {
            Ok(command) => self.execute(command).await,
            Err(e) => {
                tracing::warn!(
                    peer = %peer,
                    datagram = %String::from_utf8_lossy(datagram),
                    error = %e,
                    "Dropping datagram"
                );
                CommandOutcome::Rejected(e)
            }
        };

        let command = match &outcome {
            CommandOutcome::Applied(c) | CommandOutcome::Failed { command: c, .. } => c.name(),
            CommandOutcome::Rejected(_) => "unknown",
        };
        metrics::counter!("fs_commands_total", "command" => command, "outcome" => outcome.label())
            .increment(1);
        if let CommandOutcome::Failed { command, error } = &outcome {
            tracing::error!(peer = %peer, command = %command, error = %error, "Command failed");
        }
        outcome
    }

    async fn execute(&self, command: FsCommand) -> CommandOutcome {
        let result = match command {
            FsCommand::LockJobFolder(job) => {
                self.with_storage(move |s| s.lock_job_folder(job)).await
            }
            FsCommand::UnlockJobFolder(job) => {
                self.with_storage(move |s| s.unlock_job_folder(job)).await
            }
            FsCommand::Shutdown => {
                self.shutdown.cancel();
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                tracing::debug!(command = %command, "Command applied");
                CommandOutcome::Applied(command)
            }
            Err(error) => CommandOutcome::Failed { command, error },
        }
    }

    async fn with_storage<F>(&self, op: F) -> Result<(), String>
    where
        F: FnOnce(&JobStorage) -> Result<(), JobStorageError> + Send + 'static,
    {
        let storage = self.storage.clone();
        match tokio::task::spawn_blocking(move || op(&storage)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            FsCommand::parse(b"lock_job_folder 51234").unwrap(),
            FsCommand::LockJobFolder(51234)
        );
        assert_eq!(
            FsCommand::parse(b"  unlock_job_folder\t812\n").unwrap(),
            FsCommand::UnlockJobFolder(812)
        );
        assert_eq!(FsCommand::parse(b"shutdown").unwrap(), FsCommand::Shutdown);
    }

    #[test]
    fn test_parse_rejects_bad_datagrams() {
        assert_eq!(FsCommand::parse(b"").unwrap_err(), CommandError::Empty);
        assert_eq!(FsCommand::parse(b"   ").unwrap_err(), CommandError::Empty);
        assert_eq!(
            FsCommand::parse(b"nonexistent_cmd arg1").unwrap_err(),
            CommandError::Unknown("nonexistent_cmd".to_string())
        );
        assert_eq!(
            FsCommand::parse(b"lock_job_folder").unwrap_err(),
            CommandError::MissingArgument("lock_job_folder")
        );
        assert_eq!(
            FsCommand::parse(b"lock_job_folder abc").unwrap_err(),
            CommandError::InvalidJobNumber("abc".to_string())
        );
        assert_eq!(FsCommand::parse(&[0xff, 0xfe]).unwrap_err(), CommandError::NotUtf8);
    }

    #[test]
    fn test_display_is_wire_form() {
        let cmd = FsCommand::LockJobFolder(51234);
        assert_eq!(cmd.to_string(), "lock_job_folder 51234");
        assert_eq!(FsCommand::parse(cmd.to_string().as_bytes()).unwrap(), cmd);
    }

    #[tokio::test]
    async fn test_missing_job_folder_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = FsDaemon::bind("127.0.0.1:0", JobStorage::new(dir.path()))
            .await
            .unwrap();
        let peer = daemon.local_addr().unwrap();

        let outcome = daemon.handle_datagram(b"lock_job_folder 99999", peer).await;
        assert!(matches!(outcome, CommandOutcome::Failed { .. }));
        assert!(!daemon.shutdown_token().is_cancelled());

        let outcome = daemon.handle_datagram(b"shutdown", peer).await;
        assert_eq!(outcome, CommandOutcome::Applied(FsCommand::Shutdown));
        assert!(daemon.shutdown_token().is_cancelled());
    }
}
