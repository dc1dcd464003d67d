//! Drives the UDP daemon over a real loopback socket.

use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use gold_workflow::services::{
    fs_client::FsClient,
    fs_daemon::{FsCommand, FsDaemon},
    job_storage::JobStorage,
};

async fn start(storage: JobStorage) -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    let daemon = FsDaemon::bind("127.0.0.1:0", storage).await.unwrap();
    let addr = daemon.local_addr().unwrap();
    let handle = tokio::spawn(async move { daemon.run().await });
    (addr, handle)
}

#[tokio::test]
async fn test_shutdown_stops_daemon_without_reply() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, handle) = start(JobStorage::new(dir.path())).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"shutdown", addr).await.unwrap();

    timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap();

    let mut buf = [0u8; 64];
    let reply = timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
    assert!(reply.is_err(), "daemon must never reply");
}

#[tokio::test]
async fn test_unknown_command_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, handle) = start(JobStorage::new(dir.path())).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"nonexistent_cmd arg1", addr).await.unwrap();
    client.send_to(b"lock_job_folder not-a-number", addr).await.unwrap();
    client.send_to(b"lock_job_folder 777", addr).await.unwrap();

    let mut buf = [0u8; 64];
    let reply = timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;
    assert!(reply.is_err(), "daemon must never reply");
    assert!(!handle.is_finished());

    client.send_to(b"shutdown", addr).await.unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_client_locks_and_unlocks_job_folder() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JobStorage::new(dir.path());
    let job = storage.job_folder(51234);
    std::fs::create_dir_all(job.join("Final_Files")).unwrap();
    let (addr, handle) = start(storage).await;
    let client = FsClient::new(addr);

    client.send(&FsCommand::LockJobFolder(51234)).await.unwrap();
    client.send(&FsCommand::Shutdown).await.unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("daemon did not stop")
        .unwrap();

    let mode = std::fs::metadata(&job).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o555);

    // Restore write access so the temp dir can be removed.
    JobStorage::new(dir.path()).unlock_job_folder(51234).unwrap();
}
