// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serving the broker protocol over a framed byte stream.
//!
//! Each inbound request runs in its own task. Responses and events share one
//! outbound queue drained by a single writer task.

use nbr_adapters::BrokerHandler;
use nbr_wire::{read_frame, write_frame, BrokerEvent, BrokerRequest, Frame, ProtocolError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long queued frames may take to flush once serving stops.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Serve `handler` until the peer disconnects or `shutdown` fires.
///
/// On exit every socket the handler still holds is closed.
pub async fn serve<H, R, W>(
    handler: Arc<H>,
    mut events: mpsc::Receiver<BrokerEvent>,
    mut reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> Result<(), ServeError>
where
    H: BrokerHandler,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound, outbound_rx) = mpsc::unbounded_channel::<Frame>();
    let mut writer_task = tokio::spawn(write_loop(writer, outbound_rx));

    let forward = outbound.clone();
    let events_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if forward.send(Frame::Event { event }).is_err() {
                break;
            }
        }
    });

    let result = loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("shutdown requested");
                break Ok(());
            }
            frame = read_frame(&mut reader) => frame,
        };

        match frame {
            Ok(Frame::Request { seq, request }) => {
                debug!(seq, method = request.method(), "request");
                let handler = Arc::clone(&handler);
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    let outcome = handler.handle(request).await.map_err(|e| e.to_string());
                    if let Err(e) = &outcome {
                        debug!(seq, error = %e, "request failed");
                    }
                    let _ = outbound.send(Frame::reply(seq, outcome));
                });
            }
            Ok(other) => warn!(frame = ?other, "ignoring non-request frame"),
            Err(ProtocolError::ConnectionClosed) => {
                info!("peer disconnected");
                break Ok(());
            }
            Err(e) => break Err(ServeError::from(e)),
        }
    };

    if let Err(e) = handler.handle(BrokerRequest::WebsocketCloseAll).await {
        warn!(error = %e, "failed to close sockets on exit");
    }
    events_task.abort();
    drop(outbound);
    // Requests still in flight hold outbound senders
    if tokio::time::timeout(DRAIN_TIMEOUT, &mut writer_task).await.is_err() {
        writer_task.abort();
    }
    result
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut frames: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            warn!(error = %e, "failed to write frame, stopping writer");
            break;
        }
    }
}

#[cfg(test)]
#[path = "serve_tests.rs"]
mod tests;
