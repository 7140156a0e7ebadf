// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable [`BrokerHandler`] for tests.

use super::{BrokerError, BrokerHandler, EVENT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use nbr_core::ConnectionId;
use nbr_wire::{BrokerEvent, BrokerReply, BrokerRequest, HttpResponse, WsOpenResponse};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;

struct FakeBrokerState {
    requests: Vec<BrokerRequest>,
    /// URL prefix → statuses to answer in order; the last one repeats
    scripts: Vec<(String, VecDeque<u16>)>,
    default_status: u16,
    hanging: Vec<String>,
    open: BTreeSet<ConnectionId>,
    sent: Vec<(ConnectionId, String)>,
    next_id: u32,
    open_error: Option<String>,
    open_event_first: bool,
}

/// Fake broker. HTTP answers 200 with `{}` unless scripted; sockets are
/// bookkeeping only, with events pushed through [`FakeBroker::emit`].
#[derive(Clone)]
pub struct FakeBroker {
    inner: Arc<Mutex<FakeBrokerState>>,
    events: mpsc::Sender<BrokerEvent>,
}

impl FakeBroker {
    pub fn new() -> (Self, mpsc::Receiver<BrokerEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let state = FakeBrokerState {
            requests: Vec::new(),
            scripts: Vec::new(),
            default_status: 200,
            hanging: Vec::new(),
            open: BTreeSet::new(),
            sent: Vec::new(),
            next_id: 0,
            open_error: None,
            open_event_first: true,
        };
        (Self { inner: Arc::new(Mutex::new(state)), events }, events_rx)
    }

    /// Answer requests whose URL starts with `url_prefix` with `statuses` in
    /// order, repeating the last.
    pub fn respond(&self, url_prefix: &str, statuses: impl IntoIterator<Item = u16>) {
        let statuses: VecDeque<u16> = statuses.into_iter().collect();
        let mut state = self.inner.lock();
        state.scripts.retain(|(prefix, _)| prefix != url_prefix);
        state.scripts.push((url_prefix.to_string(), statuses));
    }

    pub fn set_default_status(&self, status: u16) {
        self.inner.lock().default_status = status;
    }

    /// Never answer HTTP requests under `url_prefix`.
    pub fn hang(&self, url_prefix: &str) {
        self.inner.lock().hanging.push(url_prefix.to_string());
    }

    pub fn fail_open(&self, error: &str) {
        self.inner.lock().open_error = Some(error.to_string());
    }

    /// Whether the `open` event is emitted before the open reply (default)
    /// or not at all.
    pub fn emit_open_event(&self, before_reply: bool) {
        self.inner.lock().open_event_first = before_reply;
    }

    pub fn requests(&self) -> Vec<BrokerRequest> {
        self.inner.lock().requests.clone()
    }

    pub fn http_count(&self, url_prefix: &str) -> usize {
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|r| matches!(r, BrokerRequest::HttpRequest(h) if h.url.starts_with(url_prefix)))
            .count()
    }

    pub fn open_ids(&self) -> Vec<ConnectionId> {
        self.inner.lock().open.iter().cloned().collect()
    }

    pub fn sent(&self) -> Vec<(ConnectionId, String)> {
        self.inner.lock().sent.clone()
    }

    /// Push an event onto the shared channel as the network would.
    pub async fn emit(&self, event: BrokerEvent) {
        if event.is_terminal() {
            self.inner.lock().open.remove(&event.id);
        }
        let _ = self.events.send(event).await;
    }

    fn next_status(&self, url: &str) -> Option<u16> {
        let mut state = self.inner.lock();
        if state.hanging.iter().any(|prefix| url.starts_with(prefix.as_str())) {
            return None;
        }
        let default = state.default_status;
        let status = state
            .scripts
            .iter_mut()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .and_then(|(_, statuses)| {
                if statuses.len() > 1 {
                    statuses.pop_front()
                } else {
                    statuses.front().copied()
                }
            });
        Some(status.unwrap_or(default))
    }
}

#[async_trait]
impl BrokerHandler for FakeBroker {
    async fn handle(&self, request: BrokerRequest) -> Result<BrokerReply, BrokerError> {
        self.inner.lock().requests.push(request.clone());

        match request {
            BrokerRequest::HttpRequest(http) => {
                let Some(status) = self.next_status(&http.url) else {
                    return std::future::pending().await;
                };
                Ok(BrokerReply::Http(HttpResponse {
                    status,
                    status_text: String::new(),
                    headers: BTreeMap::new(),
                    body: "{}".to_string(),
                }))
            }
            BrokerRequest::WebsocketOpen(_) => {
                let (id, announce) = {
                    let mut state = self.inner.lock();
                    if let Some(error) = state.open_error.clone() {
                        return Err(BrokerError::WebSocket(error));
                    }
                    state.next_id += 1;
                    let id = ConnectionId::new(format!("ws-fake-{}", state.next_id));
                    state.open.insert(id.clone());
                    (id, state.open_event_first)
                };
                if announce {
                    let _ = self.events.send(BrokerEvent::open(id.clone())).await;
                }
                Ok(BrokerReply::Opened(WsOpenResponse { id }))
            }
            BrokerRequest::WebsocketSend(send) => {
                let mut state = self.inner.lock();
                if !state.open.contains(&send.id) {
                    return Err(BrokerError::ConnectionNotFound(send.id));
                }
                state.sent.push((send.id, send.data));
                Ok(BrokerReply::Ack {})
            }
            BrokerRequest::WebsocketClose(close) => {
                if !self.inner.lock().open.remove(&close.id) {
                    return Err(BrokerError::ConnectionNotFound(close.id));
                }
                let event = BrokerEvent::close(close.id, close.code, close.reason);
                let _ = self.events.send(event).await;
                Ok(BrokerReply::Ack {})
            }
            BrokerRequest::WebsocketCloseAll => {
                let closed = std::mem::take(&mut self.inner.lock().open);
                for id in closed {
                    let _ = self.events.send(BrokerEvent::close(id, None, None)).await;
                }
                Ok(BrokerReply::Ack {})
            }
        }
    }
}
