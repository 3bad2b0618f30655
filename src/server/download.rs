//! Download endpoint: the single streamed response draining a session.
//!
//! The handler tolerates arriving before its paired sequence-0 upload by
//! waiting on the registry, enforces the single-reader claim, and removes
//! the session when its stream ends for any reason — EOF, a read error,
//! eviction, or the caller disconnecting mid-stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::watch;

use crate::error::TunnelError;
use crate::observability::metrics;
use crate::registry::{ConnectionRegistry, TunnelSession, CHUNK_BUFFER_SIZE};
use crate::server::{authorize, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct DownloadParams {
    id: Option<String>,
}

pub(crate) async fn handle(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
    headers: HeaderMap,
) -> Response {
    match process(state, params, headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn process(
    state: AppState,
    params: DownloadParams,
    headers: HeaderMap,
) -> Result<Response, TunnelError> {
    authorize(&headers, &state.secret)?;

    let id = params
        .id
        .filter(|v| !v.is_empty())
        .ok_or(TunnelError::MalformedRequest("id"))?;

    // The paired sequence-0 upload may still be in flight; wait for it
    // rather than rejecting outright.
    let session = state
        .registry
        .wait_for(&id, state.timeouts.session_wait())
        .await
        .ok_or_else(|| TunnelError::SessionWaitTimeout(id.clone()))?;

    let reader = session
        .claim_download()
        .ok_or_else(|| TunnelError::DuplicateDownloadClaim(id.clone()))?;

    tracing::info!(id = %id, "Download stream opened");

    let source = DownloadSource {
        reader,
        closed: session.closed_signal(),
        session,
        buf: vec![0u8; CHUNK_BUFFER_SIZE],
        _guard: RemoveOnDrop {
            registry: state.registry.clone(),
            id,
        },
    };
    let body = Body::from_stream(stream::unfold(source, DownloadSource::next_chunk));

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response())
}

/// State threaded through the response body stream.
struct DownloadSource {
    reader: OwnedReadHalf,
    session: Arc<TunnelSession>,
    closed: watch::Receiver<bool>,
    buf: Vec<u8>,
    _guard: RemoveOnDrop,
}

impl DownloadSource {
    /// One pull of the body stream: a read from the destination, ended by
    /// EOF, a read error, or the session's close signal. Each chunk is
    /// handed to the transport as its own frame, so bytes reach the caller
    /// as they arrive instead of batching.
    async fn next_chunk(mut self) -> Option<(Result<Bytes, Infallible>, Self)> {
        let read = tokio::select! {
            read = self.reader.read(&mut self.buf) => Some(read),
            _ = self.closed.wait_for(|closed| *closed) => None,
        };
        match read {
            Some(read) => match read {
                Ok(0) => {
                    tracing::debug!(id = %self.session.id(), "Destination closed the stream");
                    None
                }
                Ok(n) => {
                    self.session.touch();
                    metrics::record_download_read(n);
                    let chunk = Bytes::copy_from_slice(&self.buf[..n]);
                    Some((Ok(chunk), self))
                }
                Err(e) => {
                    tracing::warn!(id = %self.session.id(), error = %e, "Destination read failed");
                    None
                }
            },
            None => {
                tracing::debug!(id = %self.session.id(), "Session closed while streaming");
                None
            }
        }
    }
}

/// Removes the session once the body stream is done, whether it completed,
/// failed, or the caller disconnected mid-stream. Removal closes the
/// destination connection.
struct RemoveOnDrop {
    registry: Arc<ConnectionRegistry>,
    id: String,
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            tracing::info!(id = %self.id, "Download stream ended, session removed");
        }
    }
}
