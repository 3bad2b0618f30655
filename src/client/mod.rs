//! Client side of the tunnel.
//!
//! # Data Flow
//! ```text
//! local accept → correlation id minted
//!     → upload forwarder: local reads become sequenced POST chunks
//!     → download forwarder: one GET streamed back into the local socket
//! ```
//!
//! The two forwarders run uncoordinated; nothing binds them but the id and
//! the split local socket.

mod download;
mod upload;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{ClientConfig, TimeoutConfig, TunnelConfig};
use crate::net::{BoundedListener, ConnectionPermit, ListenerError};

/// Local listener plus the per-connection forwarder tasks it spawns.
pub struct TunnelClient {
    config: ClientConfig,
    timeouts: TimeoutConfig,
    http: reqwest::Client,
}

impl TunnelClient {
    pub fn new(config: &TunnelConfig) -> Self {
        Self {
            config: config.client.clone(),
            timeouts: config.timeouts.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Accept local connections until the shutdown signal fires.
    pub async fn run(
        self,
        listener: BoundedListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %addr,
            target = %self.config.target_address,
            "Tunnel client started"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_forwarders(stream, peer, permit),
                    Err(e) => tracing::warn!(error = %e, "Failed to accept local connection"),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Tunnel client received shutdown signal, exiting accept loop");
                    break;
                }
            }
        }
        Ok(())
    }

    fn spawn_forwarders(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let id = Uuid::new_v4().simple().to_string();
        tracing::debug!(id = %id, peer = %peer, "Local connection accepted");

        let (local_read, local_write) = stream.into_split();
        let permit = Arc::new(permit);

        let upload = upload::UploadForwarder {
            id: id.clone(),
            local: local_read,
            http: self.http.clone(),
            upload_url: self.config.upload_url.clone(),
            target_address: self.config.target_address.clone(),
            secret: self.config.secret.clone(),
        };
        let upload_permit = permit.clone();
        tokio::spawn(async move {
            let _permit = upload_permit;
            upload.run().await;
        });

        let download = download::DownloadForwarder {
            id,
            local: local_write,
            http: self.http.clone(),
            download_url: self.config.download_url.clone(),
            secret: self.config.secret.clone(),
            head_start: self.timeouts.download_delay(),
        };
        tokio::spawn(async move {
            let _permit = permit;
            download.run().await;
        });
    }
}
