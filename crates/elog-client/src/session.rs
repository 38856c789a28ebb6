//! `SessionManager`: owns the identity and the keepalive task.
//!
//! The keepalive task owns its TCP connection. It writes `identity + "\n"`
//! once per interval and never reads. Write failures are logged and the loop
//! keeps going; the connection is shut down once, after cancellation.

use elog_core::{error::ElogError, types::Identity};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct SessionManager {
    heartbeat_addr: String,
    interval: Duration,
    identity: RwLock<Option<Identity>>,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    pub fn new(heartbeat_addr: impl Into<String>, interval: Duration) -> Self {
        Self {
            heartbeat_addr: heartbeat_addr.into(),
            interval,
            identity: RwLock::new(None),
            session: Mutex::new(None),
        }
    }

    /// Snapshot of the live identity.
    pub fn identity(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn require_identity(&self) -> Result<Identity, ElogError> {
        self.identity().ok_or(ElogError::NotRegistered)
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Open the keepalive connection and start the loop for `identity`.
    ///
    /// A live session is stopped and replaced, but only once the new
    /// connection is up; a failed connect leaves the old session running.
    pub async fn start(&self, identity: Identity) -> Result<(), ElogError> {
        let stream = TcpStream::connect(&self.heartbeat_addr)
            .await
            .map_err(|e| ElogError::Connect {
                addr: self.heartbeat_addr.clone(),
                reason: e.to_string(),
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "set_nodelay failed");
        }

        let mut slot = self.session.lock().await;
        if let Some(old) = slot.take() {
            debug!("replacing live session");
            stop(old).await;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(keepalive(
            stream,
            identity.clone(),
            self.interval,
            cancel.clone(),
        ));
        *slot = Some(Session { cancel, task });
        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity.clone());

        info!(
            identity = %identity,
            addr = %self.heartbeat_addr,
            interval_s = self.interval.as_secs(),
            "session started"
        );
        Ok(())
    }

    /// Cancel the keepalive loop and wait for the connection to be released.
    pub async fn close(&self) -> Result<(), ElogError> {
        let session = self.session.lock().await.take().ok_or(ElogError::NotRegistered)?;
        stop(session).await;
        let identity = self
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(id) = identity {
            info!(identity = %id, "session closed");
        }
        Ok(())
    }
}

async fn stop(session: Session) {
    session.cancel.cancel();
    if let Err(e) = session.task.await {
        warn!(error = %e, "keepalive task ended abnormally");
    }
}

async fn keepalive(
    mut stream: TcpStream,
    identity: Identity,
    period: Duration,
    cancel: CancellationToken,
) {
    let beat = format!("{identity}\n");
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                match write_beat(&mut stream, beat.as_bytes()).await {
                    Ok(()) => debug!(identity = %identity, "heartbeat sent"),
                    Err(e) => warn!(identity = %identity, error = %e, "heartbeat write failed"),
                }
            }
        }
    }

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "keepalive shutdown");
    }
    debug!(identity = %identity, "keepalive stopped");
}

async fn write_beat(stream: &mut TcpStream, beat: &[u8]) -> std::io::Result<()> {
    stream.write_all(beat).await?;
    stream.flush().await
}
