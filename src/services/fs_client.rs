use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::services::fs_daemon::FsCommand;

/// Sends fire-and-forget commands to the file server daemon.
#[derive(Debug, Clone)]
pub struct FsClient {
    target: SocketAddr,
}

impl FsClient {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }

    pub async fn send(&self, command: &FsCommand) -> io::Result<()> {
        let local: SocketAddr = if self.target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        let wire = command.to_string();
        socket.send_to(wire.as_bytes(), self.target).await?;
        tracing::info!(target_addr = %self.target, command = %wire, "Command sent");
        Ok(())
    }
}
