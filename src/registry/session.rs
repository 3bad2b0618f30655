//! Per-tunnel session state.
//!
//! # Responsibilities
//! - Own the destination TCP connection (split into read/write halves)
//! - Enforce strict chunk sequencing for the upload side
//! - Hand the read half to exactly one download stream
//! - Track activity for idle eviction

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;

/// Read/write buffer size for tunnel payload copies.
pub const CHUNK_BUFFER_SIZE: usize = 32 * 1024;

/// Server-side record of one tunneled TCP connection.
///
/// The registry lock never covers payload I/O; handlers operate on an
/// `Arc<TunnelSession>` they already hold, so the two halves of the
/// destination connection can be driven by two tasks at once (upload
/// writes, download reads).
pub struct TunnelSession {
    id: String,

    /// Upload side of the destination connection. Writes for one id are
    /// already serialized by the sequence check; the mutex keeps a racing
    /// rogue writer from interleaving bytes mid-chunk.
    writer: tokio::sync::Mutex<OwnedWriteHalf>,

    /// Download side; taken exactly once by the claiming reader.
    reader: Mutex<Option<OwnedReadHalf>>,

    created_at: Instant,

    /// Milliseconds since `created_at` of the last accepted write or read.
    /// Relaxed ordering: uniqueness of the latest value is irrelevant, the
    /// reaper only needs a recent-enough observation.
    last_activity_ms: AtomicU64,

    last_sequence: AtomicU64,

    download_claimed: AtomicBool,

    /// Flipped once when the session is removed from the registry, so an
    /// in-flight download loop observes eviction.
    closed: watch::Sender<bool>,
}

impl TunnelSession {
    /// Wrap a freshly dialed destination connection. The creating chunk is
    /// sequence 0, so the session starts with `last_sequence == 0`.
    pub fn new(id: String, target: TcpStream) -> Self {
        let (reader, writer) = target.into_split();
        let (closed, _) = watch::channel(false);
        Self {
            id,
            writer: tokio::sync::Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
            created_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            last_sequence: AtomicU64::new(0),
            download_claimed: AtomicBool::new(false),
            closed,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Record upload/download activity now.
    pub fn touch(&self) {
        let ms = self.created_at.elapsed().as_millis() as u64;
        self.last_activity_ms.store(ms, Ordering::Relaxed);
    }

    /// Instant of the last recorded activity (creation counts).
    pub fn last_activity(&self) -> Instant {
        self.created_at + Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Relaxed)
    }

    /// Whether `sequence` directly follows the last accepted chunk.
    pub fn sequence_follows(&self, sequence: u64) -> bool {
        sequence == self.last_sequence.load(Ordering::Relaxed) + 1
    }

    pub fn advance_sequence(&self, sequence: u64) {
        self.last_sequence.store(sequence, Ordering::Relaxed);
    }

    /// Copy one upload chunk to the destination.
    pub async fn write_chunk(&self, payload: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(payload).await
    }

    /// Take the read half for the single download stream.
    ///
    /// Returns `None` once a reader has claimed this session; the claim
    /// flag transitions false→true exactly once.
    pub fn claim_download(&self) -> Option<OwnedReadHalf> {
        if self.download_claimed.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.reader
            .lock()
            .expect("session reader mutex poisoned")
            .take()
    }

    /// Receiver that resolves once the session has been removed.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.send_replace(true);
    }
}
