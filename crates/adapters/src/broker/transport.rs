// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI-logic side transports to a broker.

use super::{BrokerHandler, BrokerTransport, TransportError, EVENT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use nbr_wire::{
    read_frame, write_frame, BrokerEvent, BrokerReply, BrokerRequest, Frame, ProtocolError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls a handler living in the same process.
pub struct InProcessTransport<H: BrokerHandler> {
    handler: Arc<H>,
    events: Mutex<Option<mpsc::Receiver<BrokerEvent>>>,
    timeout: Duration,
}

impl<H: BrokerHandler> InProcessTransport<H> {
    pub fn new(handler: Arc<H>, events: mpsc::Receiver<BrokerEvent>) -> Self {
        Self { handler, events: Mutex::new(Some(events)), timeout: DEFAULT_REQUEST_TIMEOUT }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

#[async_trait]
impl<H: BrokerHandler> BrokerTransport for InProcessTransport<H> {
    async fn request(&self, request: BrokerRequest) -> Result<BrokerReply, TransportError> {
        tokio::time::timeout(self.timeout, self.handler.handle(request))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Broker(e.to_string()))
    }

    fn take_events(&self) -> Option<mpsc::Receiver<BrokerEvent>> {
        self.events.lock().take()
    }
}

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<BrokerReply, TransportError>>>>>;

/// Framed connection to a broker process over any byte stream.
///
/// Requests carry a sequence number and are matched to responses through a
/// pending map; a single writer task owns the outbound half. When the inbound
/// half ends, every pending request fails with [`TransportError::Closed`].
pub struct StreamTransport {
    seq: AtomicU64,
    pending: Pending,
    closed: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Frame>,
    events: Mutex<Option<mpsc::Receiver<BrokerEvent>>>,
    timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamTransport {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let closed = Arc::new(AtomicBool::new(false));
        let reader_task =
            tokio::spawn(read_loop(reader, Arc::clone(&pending), Arc::clone(&closed), events_tx));
        let writer_task = tokio::spawn(write_loop(writer, outbound_rx));

        Self {
            seq: AtomicU64::new(1),
            pending,
            closed,
            outbound,
            events: Mutex::new(Some(events_rx)),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            tasks: vec![reader_task, writer_task],
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl BrokerTransport for StreamTransport {
    async fn request(&self, request: BrokerRequest) -> Result<BrokerReply, TransportError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(seq, tx);

        // The reader sets `closed` before draining pending waiters
        if self.closed.load(Ordering::SeqCst)
            || self.outbound.send(Frame::Request { seq, request }).is_err()
        {
            self.pending.lock().remove(&seq);
            return Err(TransportError::Closed);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.pending.lock().remove(&seq);
                Err(TransportError::Timeout)
            }
        }
    }

    fn take_events(&self) -> Option<mpsc::Receiver<BrokerEvent>> {
        self.events.lock().take()
    }
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    pending: Pending,
    closed: Arc<AtomicBool>,
    events: mpsc::Sender<BrokerEvent>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Frame::Response { seq, result, error }) => {
                let outcome = match (result, error) {
                    (_, Some(error)) => Err(TransportError::Broker(error)),
                    (Some(reply), None) => Ok(reply),
                    (None, None) => Ok(BrokerReply::Ack {}),
                };
                let waiter = pending.lock().remove(&seq);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(outcome);
                    }
                    None => tracing::debug!(seq, "response for unknown request"),
                }
            }
            Ok(Frame::Event { event }) => {
                if events.send(event).await.is_err() {
                    tracing::debug!("event receiver dropped");
                }
            }
            Ok(Frame::Request { seq, .. }) => {
                tracing::warn!(seq, "broker sent a request frame, ignoring");
            }
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                tracing::warn!(error = %e, "broker stream failed");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    let waiters: Vec<_> = pending.lock().drain().collect();
    for (_, waiter) in waiters {
        let _ = waiter.send(Err(TransportError::Closed));
    }
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            tracing::warn!(error = %e, "broker write failed");
            break;
        }
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
