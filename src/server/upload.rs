//! Upload endpoint: sequenced chunk ingestion.
//!
//! The first chunk (sequence 0) dials the destination and creates the
//! session; every later chunk must directly follow the last accepted one.
//! Once a chunk is accepted the success response is committed: a failed
//! destination write is logged but does not revoke it.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::TunnelError;
use crate::observability::metrics;
use crate::registry::TunnelSession;
use crate::server::{authorize, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    /// Correlation id binding this chunk to a tunnel.
    id: Option<String>,
    /// Chunk sequence number, non-negative integer.
    c: Option<String>,
    /// Destination address, dialed on sequence 0.
    to: Option<String>,
}

pub(crate) async fn handle(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    payload: Bytes,
) -> Response {
    match process(state, params, headers, payload).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn process(
    state: AppState,
    params: UploadParams,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Response, TunnelError> {
    authorize(&headers, &state.secret)?;

    let id = params
        .id
        .filter(|v| !v.is_empty())
        .ok_or(TunnelError::MalformedRequest("id"))?;
    let to = params
        .to
        .filter(|v| !v.is_empty())
        .ok_or(TunnelError::MalformedRequest("to"))?;
    let sequence: u64 = params
        .c
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or(TunnelError::MalformedRequest("c"))?;

    tracing::debug!(id = %id, sequence, bytes = payload.len(), "Upload chunk received");

    let session = match state.registry.lookup(&id) {
        Some(session) => {
            if !session.sequence_follows(sequence) {
                return Err(TunnelError::OrderingViolation {
                    expected: session.last_sequence() + 1,
                    got: sequence,
                    id,
                });
            }
            session
        }
        None => {
            // Only the session-creating chunk may arrive for an unknown id.
            if sequence != 0 {
                return Err(TunnelError::OrderingViolation {
                    expected: 0,
                    got: sequence,
                    id,
                });
            }
            let target = dial(&to, state.timeouts.dial_timeout()).await?;
            let session = Arc::new(TunnelSession::new(id, target));
            state.registry.insert(session.clone());
            tracing::info!(id = %session.id(), to = %to, "Session opened");
            session
        }
    };

    // Payload delivery is best-effort once the chunk is accepted.
    if let Err(e) = session.write_chunk(&payload).await {
        tracing::error!(id = %session.id(), error = %e, "Destination write failed");
    }
    session.touch();
    session.advance_sequence(sequence);
    metrics::record_upload_chunk(payload.len());

    Ok((StatusCode::OK, "upload accepted").into_response())
}

async fn dial(addr: &str, bound: Duration) -> Result<TcpStream, TunnelError> {
    match timeout(bound, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(TunnelError::DialFailure {
            addr: addr.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(TunnelError::DialFailure {
            addr: addr.to_string(),
            reason: format!("connect timed out after {:?}", bound),
        }),
    }
}
