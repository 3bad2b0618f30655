//! Upload forwarder: local reads become sequenced POST chunks.
//!
//! One HTTP request per local read, not one streaming request body —
//! intermediaries that tolerate many short POSTs often cap or buffer
//! long-lived bodies. Each exchange completes before the next read, so
//! chunk order on the wire matches read order.

use reqwest::header::AUTHORIZATION;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;

use crate::registry::CHUNK_BUFFER_SIZE;

pub(crate) struct UploadForwarder {
    pub id: String,
    pub local: OwnedReadHalf,
    pub http: reqwest::Client,
    pub upload_url: String,
    pub target_address: String,
    pub secret: String,
}

impl UploadForwarder {
    pub(crate) async fn run(mut self) {
        let mut buf = vec![0u8; CHUNK_BUFFER_SIZE];
        let mut sequence: u64 = 0;

        loop {
            let n = match self.local.read(&mut buf).await {
                Ok(0) => {
                    tracing::debug!(id = %self.id, "Local peer closed the upload side");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(id = %self.id, error = %e, "Local read failed");
                    break;
                }
            };

            let seq = sequence.to_string();
            let response = self
                .http
                .post(&self.upload_url)
                .query(&[
                    ("id", self.id.as_str()),
                    ("c", seq.as_str()),
                    ("to", self.target_address.as_str()),
                ])
                .header(AUTHORIZATION, format!("Bearer {}", self.secret))
                .body(buf[..n].to_vec())
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    // The body is discarded, but the exchange must finish
                    // before the next read so chunks stay ordered.
                    let _ = response.bytes().await;
                    if !status.is_success() {
                        tracing::warn!(id = %self.id, sequence, status = %status, "Upload chunk rejected");
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %self.id, sequence, error = %e, "Upload request failed");
                    return;
                }
            }

            sequence += 1;
        }

        tracing::debug!(id = %self.id, chunks = sequence, "Upload forwarder finished");
    }
}
