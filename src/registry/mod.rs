//! Connection registry subsystem.
//!
//! # Data Flow
//! ```text
//! upload seq 0   → insert(id, session)
//! upload seq n   → lookup(id) → chunk written outside the lock
//! download       → wait_for(id) → claim → streamed outside the lock
//! reaper tick    → sweep(now, idle threshold)
//! ```
//!
//! # Design Decisions
//! - One exclusive lock around map mutation only; payload I/O always runs
//!   against an `Arc<TunnelSession>` outside the critical section
//! - A small number of concurrent tunnels is expected, so a single coarse
//!   lock beats sharding; the atomicity contract of the four operations is
//!   what matters
//! - Download waiters park on a notify instead of polling the map; the
//!   wait bound and failure outcome are unchanged

pub mod session;

pub use session::{TunnelSession, CHUNK_BUFFER_SIZE};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// Concurrency-safe store of live tunnel sessions, keyed by correlation id.
pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<String, Arc<TunnelSession>>>,
    /// Woken on every insert so download handlers can wait for the racing
    /// sequence-0 upload.
    inserted: Notify,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            inserted: Notify::new(),
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<TunnelSession>> {
        self.sessions
            .lock()
            .expect("registry mutex poisoned")
            .get(id)
            .cloned()
    }

    /// Insert a session, replacing (and closing) any previous entry under
    /// the same id. Concurrent sequence-0 uploads for one id are not
    /// serialized beyond this; the protocol assumes a single logical
    /// writer per id.
    pub fn insert(&self, session: Arc<TunnelSession>) {
        let previous = self
            .sessions
            .lock()
            .expect("registry mutex poisoned")
            .insert(session.id().to_string(), session);
        if let Some(previous) = previous {
            previous.mark_closed();
        }
        self.inserted.notify_waiters();
    }

    /// Remove a session, closing its destination connection. Idempotent;
    /// returns whether an entry was actually removed.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self
            .sessions
            .lock()
            .expect("registry mutex poisoned")
            .remove(id);
        match removed {
            Some(session) => {
                session.mark_closed();
                true
            }
            None => false,
        }
    }

    /// Evict every session idle past `threshold`, closing each. Returns
    /// the eviction count.
    pub fn sweep(&self, now: Instant, threshold: Duration) -> usize {
        let mut sessions = self.sessions.lock().expect("registry mutex poisoned");
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_activity()) > threshold)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(session) = sessions.remove(id) {
                session.mark_closed();
            }
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `max_wait` for `id` to appear.
    ///
    /// The upload request that creates a session can lose the race against
    /// its paired download request; the download side waits here instead
    /// of failing immediately.
    pub async fn wait_for(&self, id: &str, max_wait: Duration) -> Option<Arc<TunnelSession>> {
        let deadline = Instant::now() + max_wait;
        loop {
            // Register interest before the lookup so an insert between the
            // miss and the await cannot be lost.
            let notified = self.inserted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(session) = self.lookup(id) {
                return Some(session);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return self.lookup(id);
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    /// A session backed by a real loopback connection, plus the peer end
    /// so tests can observe the destination side.
    async fn session(id: &str) -> (Arc<TunnelSession>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let target = TcpStream::connect(addr).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        (Arc::new(TunnelSession::new(id.to_string(), target)), peer)
    }

    async fn assert_peer_closed(peer: &mut TcpStream) {
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(1), peer.read(&mut buf))
            .await
            .expect("peer close not observed in time")
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn sequence_must_directly_follow() {
        let (session, _peer) = session("s1").await;
        assert_eq!(session.last_sequence(), 0);
        assert!(session.sequence_follows(1));
        assert!(!session.sequence_follows(2));
        assert!(!session.sequence_follows(0));

        session.advance_sequence(1);
        assert_eq!(session.last_sequence(), 1);
        assert!(!session.sequence_follows(1));
        assert!(session.sequence_follows(2));
    }

    #[tokio::test]
    async fn download_claim_is_exclusive() {
        let (session, _peer) = session("s1").await;
        assert!(session.claim_download().is_some());
        assert!(session.claim_download().is_none());
    }

    #[tokio::test]
    async fn remove_closes_the_destination() {
        let registry = ConnectionRegistry::new();
        let (session, mut peer) = session("gone").await;
        registry.insert(session);

        assert!(registry.remove("gone"));
        assert!(!registry.remove("gone"));
        assert_peer_closed(&mut peer).await;
    }

    #[tokio::test]
    async fn insert_replaces_and_closes_the_previous_entry() {
        let registry = ConnectionRegistry::new();
        let (first, mut first_peer) = session("dup").await;
        registry.insert(first);
        let (second, _second_peer) = session("dup").await;
        registry.insert(second);

        assert_eq!(registry.len(), 1);
        assert_peer_closed(&mut first_peer).await;
    }

    #[tokio::test]
    async fn sweep_evicts_only_idle_sessions() {
        let registry = ConnectionRegistry::new();
        let (idle, mut idle_peer) = session("idle").await;
        let (busy, _busy_peer) = session("busy").await;
        registry.insert(idle);
        registry.insert(busy.clone());

        tokio::time::sleep(Duration::from_millis(80)).await;
        busy.touch();

        let evicted = registry.sweep(Instant::now(), Duration::from_millis(50));
        assert_eq!(evicted, 1);
        assert!(registry.lookup("idle").is_none());
        assert!(registry.lookup("busy").is_some());
        assert_peer_closed(&mut idle_peer).await;
    }

    #[tokio::test]
    async fn removal_signals_in_flight_readers() {
        let registry = ConnectionRegistry::new();
        let (session, _peer) = session("live").await;
        registry.insert(session.clone());

        let mut closed = session.closed_signal();
        assert!(!*closed.borrow());

        registry.remove("live");
        tokio::time::timeout(Duration::from_secs(1), closed.changed())
            .await
            .expect("close signal not observed in time")
            .unwrap();
        assert!(*closed.borrow());
    }

    #[tokio::test]
    async fn wait_for_sees_a_late_insert() {
        let registry = Arc::new(ConnectionRegistry::new());
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_for("late", Duration::from_secs(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let (session, _peer) = session("late").await;
        registry.insert(session);

        assert!(waiter.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wait_for_gives_up_at_the_bound() {
        let registry = ConnectionRegistry::new();
        let start = Instant::now();
        assert!(registry
            .wait_for("never", Duration::from_millis(100))
            .await
            .is_none());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
