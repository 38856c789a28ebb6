//! Keepalive loop against a local TCP listener.

use elog_client::SessionManager;
use elog_core::{error::ElogError, types::Identity};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const TICK: Duration = Duration::from_millis(40);
const WAIT: Duration = Duration::from_secs(5);

async fn listener() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    (listener, addr)
}

async fn accept(listener: &TcpListener) -> TcpStream {
    timeout(WAIT, listener.accept()).await.unwrap().unwrap().0
}

/// Read until the peer closes; true if EOF arrived within `WAIT`.
async fn reaches_eof(socket: TcpStream) -> bool {
    let mut socket = socket;
    let mut buf = [0u8; 256];
    timeout(WAIT, async {
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => continue,
            }
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn writes_identity_lines_every_tick() {
    let (listener, addr) = listener().await;
    let session = SessionManager::new(addr, TICK);
    session.start(Identity::new("0xabc").unwrap()).await.unwrap();

    let socket = accept(&listener).await;
    let mut lines = BufReader::new(socket).lines();
    for _ in 0..3 {
        let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
        assert_eq!(line.as_deref(), Some("0xabc"));
    }

    assert!(session.is_active().await);
    assert_eq!(session.identity().unwrap().as_str(), "0xabc");
    session.close().await.unwrap();
    assert!(!session.is_active().await);
    assert!(session.identity().is_none());
}

#[tokio::test]
async fn close_releases_the_connection() {
    let (listener, addr) = listener().await;
    let session = SessionManager::new(addr, TICK);
    session.start(Identity::new("did:elog:1").unwrap()).await.unwrap();
    let socket = accept(&listener).await;

    session.close().await.unwrap();
    assert!(reaches_eof(socket).await);
}

#[tokio::test]
async fn nothing_is_written_before_the_first_interval() {
    let (listener, addr) = listener().await;
    let session = SessionManager::new(addr, Duration::from_secs(60));
    session.start(Identity::new("0xabc").unwrap()).await.unwrap();
    let mut socket = accept(&listener).await;

    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_millis(150), socket.read(&mut buf)).await;
    assert!(read.is_err(), "no heartbeat expected yet");
    session.close().await.unwrap();
}

#[tokio::test]
async fn close_without_session_is_not_registered() {
    let session = SessionManager::new("127.0.0.1:1", TICK);
    assert!(matches!(session.close().await, Err(ElogError::NotRegistered)));
    assert!(matches!(session.require_identity(), Err(ElogError::NotRegistered)));
}

#[tokio::test]
async fn unreachable_endpoint_is_connect_error() {
    let (listener, addr) = listener().await;
    drop(listener);

    let session = SessionManager::new(addr, TICK);
    let err = session
        .start(Identity::new("0xabc").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ElogError::Connect { .. }));
    assert!(session.identity().is_none());
}

#[tokio::test]
async fn restarting_replaces_the_old_loop() {
    let (listener, addr) = listener().await;
    let session = SessionManager::new(addr, TICK);

    session.start(Identity::new("first").unwrap()).await.unwrap();
    let old = accept(&listener).await;

    session.start(Identity::new("second").unwrap()).await.unwrap();
    let new = accept(&listener).await;

    assert!(reaches_eof(old).await);
    assert_eq!(session.identity().unwrap().as_str(), "second");

    let mut lines = BufReader::new(new).lines();
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap();
    assert_eq!(line.as_deref(), Some("second"));
    session.close().await.unwrap();
}

#[tokio::test]
async fn peer_hangup_does_not_stop_the_loop() {
    let (listener, addr) = listener().await;
    let session = SessionManager::new(addr, TICK);
    session.start(Identity::new("0xabc").unwrap()).await.unwrap();

    drop(accept(&listener).await);
    tokio::time::sleep(TICK * 4).await;

    // Failed writes are logged; the session stays up until closed.
    assert!(session.is_active().await);
    session.close().await.unwrap();
}
