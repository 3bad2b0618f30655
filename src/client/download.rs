//! Download forwarder: one GET streamed into the local socket.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::AUTHORIZATION;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;

pub(crate) struct DownloadForwarder {
    pub id: String,
    pub local: OwnedWriteHalf,
    pub http: reqwest::Client,
    pub download_url: String,
    pub secret: String,
    pub head_start: Duration,
}

impl DownloadForwarder {
    pub(crate) async fn run(mut self) {
        // Give the sequence-0 upload a head start so the server-side
        // session usually exists before this request lands, keeping the
        // server's registry wait as a fallback rather than the norm.
        tokio::time::sleep(self.head_start).await;

        let response = match self
            .http
            .get(&self.download_url)
            .query(&[("id", self.id.as_str())])
            .header(AUTHORIZATION, format!("Bearer {}", self.secret))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "Download request failed");
                return self.close().await;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(id = %self.id, status = %response.status(), "Download request rejected");
            return self.close().await;
        }

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => {
                    if let Err(e) = self.local.write_all(&chunk).await {
                        tracing::warn!(id = %self.id, error = %e, "Local write failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(id = %self.id, error = %e, "Download stream failed");
                    break;
                }
            }
        }

        tracing::debug!(id = %self.id, "Download forwarder finished");
        self.close().await;
    }

    /// Closing the local write side is the end-of-tunnel signal the local
    /// peer observes.
    async fn close(mut self) {
        let _ = self.local.shutdown().await;
    }
}
