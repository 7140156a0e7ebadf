// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI-logic side of the connectivity proxy.
//!
//! All WebSocket events from the broker arrive on one shared channel. A
//! dispatcher task demultiplexes them by connection id into per-connection
//! queues held in an explicit registry. A registration ends on `close` or
//! `error`, or when the connection is closed from this side.
//!
//! The broker may emit events for a connection before its open reply has been
//! processed here. Those land in a bounded early-event buffer and are
//! delivered when the connection registers.

use crate::error::ProxyError;
use crate::poller::LivenessProbe;
use async_trait::async_trait;
use nbr_adapters::BrokerTransport;
use nbr_core::{ConnectionId, RuntimeId, RuntimeRecord};
use nbr_wire::{
    BrokerEvent, BrokerReply, BrokerRequest, HttpRequest, HttpResponse, WsCloseRequest,
    WsOpenRequest, WsSendRequest,
};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events held for connections that have not registered yet.
pub const EARLY_EVENT_LIMIT: usize = 64;

/// Recently closed ids whose trailing events are dropped instead of buffered.
const RETIRED_LIMIT: usize = 64;

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<BrokerEvent>>,
    early: VecDeque<BrokerEvent>,
    retired: VecDeque<ConnectionId>,
}

impl Registry {
    fn dispatch(&mut self, event: BrokerEvent) {
        if let Some(queue) = self.connections.get(&event.id) {
            let terminal = event.is_terminal();
            let id = event.id.clone();
            let delivered = queue.send(event).is_ok();
            if terminal || !delivered {
                if delivered {
                    tracing::debug!(%id, "connection ended");
                } else {
                    tracing::debug!(%id, "connection dropped by consumer, unregistering");
                }
                self.connections.remove(&id);
                self.retire(id);
            }
            return;
        }
        if self.retired.contains(&event.id) {
            return;
        }
        if self.early.len() >= EARLY_EVENT_LIMIT {
            if let Some(dropped) = self.early.pop_front() {
                tracing::warn!(
                    id = %dropped.id,
                    kind = %dropped.kind,
                    "early event buffer full, dropping"
                );
            }
        }
        self.early.push_back(event);
    }

    /// Register `id`, replaying any buffered events for it.
    fn register(&mut self, id: &ConnectionId) -> mpsc::UnboundedReceiver<BrokerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut ended = false;
        let mut kept = VecDeque::with_capacity(self.early.len());
        for event in self.early.drain(..) {
            if event.id == *id {
                ended |= event.is_terminal();
                let _ = tx.send(event);
            } else {
                kept.push_back(event);
            }
        }
        self.early = kept;
        if ended {
            self.retire(id.clone());
        } else {
            self.connections.insert(id.clone(), tx);
        }
        rx
    }

    fn unregister(&mut self, id: &ConnectionId) -> bool {
        let known = self.connections.remove(id).is_some();
        self.retire(id.clone());
        known
    }

    fn retire(&mut self, id: ConnectionId) {
        if self.retired.len() >= RETIRED_LIMIT {
            self.retired.pop_front();
        }
        self.retired.push_back(id);
    }

    fn clear(&mut self) {
        let ids: Vec<ConnectionId> = self.connections.drain().map(|(id, _)| id).collect();
        for id in ids {
            self.retire(id);
        }
        self.early.clear();
    }
}

struct ProxyInner {
    transport: Arc<dyn BrokerTransport>,
    registry: Arc<Mutex<Registry>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        if let Some(task) = &self.dispatcher {
            task.abort();
        }
    }
}

/// Connectivity proxy over a broker transport. Cheap to clone.
///
/// Must be created inside a tokio runtime; it spawns the event dispatcher.
#[derive(Clone)]
pub struct ConnectivityProxy {
    inner: Arc<ProxyInner>,
}

impl ConnectivityProxy {
    pub fn new(transport: Arc<dyn BrokerTransport>) -> Self {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let dispatcher = match transport.take_events() {
            Some(events) => Some(tokio::spawn(dispatch_events(events, Arc::clone(&registry)))),
            None => {
                tracing::warn!(
                    "broker event stream already taken, websocket events will not be delivered"
                );
                None
            }
        };
        Self { inner: Arc::new(ProxyInner { transport, registry, dispatcher }) }
    }

    pub async fn http_request(&self, request: HttpRequest) -> Result<HttpResponse, ProxyError> {
        match self.inner.transport.request(BrokerRequest::HttpRequest(request)).await? {
            BrokerReply::Http(response) => Ok(response),
            _ => Err(ProxyError::UnexpectedReply("http/request")),
        }
    }

    pub async fn websocket_open(&self, request: WsOpenRequest) -> Result<WsConnection, ProxyError> {
        let url = request.url.clone();
        let id = match self.inner.transport.request(BrokerRequest::WebsocketOpen(request)).await? {
            BrokerReply::Opened(opened) => opened.id,
            _ => return Err(ProxyError::UnexpectedReply("websocket/open")),
        };
        let events = self.inner.registry.lock().register(&id);
        tracing::debug!(%id, url = %url, "websocket registered");
        Ok(WsConnection { id, events })
    }

    pub async fn websocket_send(
        &self,
        id: &ConnectionId,
        data: impl Into<String>,
    ) -> Result<(), ProxyError> {
        if !self.inner.registry.lock().connections.contains_key(id) {
            return Err(ProxyError::ConnectionNotFound(id.clone()));
        }
        let request = WsSendRequest { id: id.clone(), data: data.into() };
        self.inner
            .transport
            .request(BrokerRequest::WebsocketSend(request))
            .await
            .map_err(|e| ProxyError::for_connection(id, e))?;
        Ok(())
    }

    /// Close a connection. The registration is dropped before the broker is
    /// asked, so later sends fail immediately.
    pub async fn websocket_close(
        &self,
        id: &ConnectionId,
        code: Option<u16>,
        reason: Option<String>,
    ) -> Result<(), ProxyError> {
        self.inner.registry.lock().unregister(id);
        let request = WsCloseRequest { id: id.clone(), code, reason };
        self.inner
            .transport
            .request(BrokerRequest::WebsocketClose(request))
            .await
            .map_err(|e| ProxyError::for_connection(id, e))?;
        Ok(())
    }

    pub async fn websocket_close_all(&self) -> Result<(), ProxyError> {
        self.inner.registry.lock().clear();
        self.inner.transport.request(BrokerRequest::WebsocketCloseAll).await?;
        Ok(())
    }

    /// Number of connections currently registered on this side.
    pub fn open_connections(&self) -> usize {
        self.inner.registry.lock().connections.len()
    }

    /// Drop every registration and buffered event without contacting the broker.
    pub fn clear(&self) {
        self.inner.registry.lock().clear();
    }

    /// Prepare the HTTP/WebSocket path to a runtime's server.
    pub fn bind(&self, runtime: &RuntimeRecord) -> Result<ConnectionHandle, ProxyError> {
        let (Some(ingress), Some(token)) = (&runtime.ingress_url, &runtime.token) else {
            return Err(ProxyError::MissingIngress(runtime.pod_name.clone()));
        };
        let base_url = ingress.trim_end_matches('/').to_string();
        let ws_url = websocket_url(&base_url);
        tracing::info!(runtime = %runtime.pod_name, url = %base_url, "connectivity bound");
        Ok(ConnectionHandle {
            proxy: self.clone(),
            runtime_id: runtime.pod_name.clone(),
            base_url,
            ws_url,
            token: token.clone(),
            sockets: Mutex::new(BTreeSet::new()),
        })
    }

    /// Close every socket opened through `handle`.
    ///
    /// Sockets that are already gone are skipped. The first other failure is
    /// returned after all closes have been attempted.
    pub async fn dispose(&self, handle: &ConnectionHandle) -> Result<(), ProxyError> {
        let sockets = std::mem::take(&mut *handle.sockets.lock());
        let mut first_error = None;
        for id in sockets {
            match self.websocket_close(&id, None, None).await {
                Ok(()) | Err(ProxyError::ConnectionNotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(
                        %id,
                        runtime = %handle.runtime_id,
                        error = %e,
                        "failed to close socket"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        tracing::info!(runtime = %handle.runtime_id, "connectivity disposed");
        first_error.map_or(Ok(()), Err)
    }

    /// `GET {url}/api` with the server token. True only on a 200.
    pub async fn probe(&self, url: &str, token: &str) -> bool {
        let request = HttpRequest::get(format!("{}/api", url.trim_end_matches('/')))
            .header("Authorization", format!("token {token}"));
        match self.http_request(request).await {
            Ok(response) => {
                tracing::debug!(url, status = response.status, "liveness probe");
                response.status == 200
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "liveness probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl LivenessProbe for ConnectivityProxy {
    async fn probe(&self, url: &str, token: &str) -> bool {
        ConnectivityProxy::probe(self, url, token).await
    }
}

async fn dispatch_events(mut events: mpsc::Receiver<BrokerEvent>, registry: Arc<Mutex<Registry>>) {
    while let Some(event) = events.recv().await {
        registry.lock().dispatch(event);
    }
    tracing::debug!("broker event stream ended");
}

fn websocket_url(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    }
}

/// An open WebSocket as seen from the UI-logic side.
///
/// The event queue ends after a `close` or `error` event.
pub struct WsConnection {
    id: ConnectionId,
    events: mpsc::UnboundedReceiver<BrokerEvent>,
}

impl WsConnection {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub async fn recv(&mut self) -> Option<BrokerEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BrokerEvent> {
        self.events.try_recv().ok()
    }
}

/// Per-runtime connectivity: every kernel request for a runtime goes
/// through its handle.
pub struct ConnectionHandle {
    proxy: ConnectivityProxy,
    runtime_id: RuntimeId,
    base_url: String,
    ws_url: String,
    token: String,
    sockets: Mutex<BTreeSet<ConnectionId>>,
}

impl ConnectionHandle {
    pub fn runtime_id(&self) -> &RuntimeId {
        &self.runtime_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Sockets opened through this handle and not yet disposed.
    pub fn sockets(&self) -> Vec<ConnectionId> {
        self.sockets.lock().iter().cloned().collect()
    }

    /// Call the runtime's server at `path` with its token.
    pub async fn http(
        &self,
        method: &str,
        path: &str,
        body: Option<String>,
    ) -> Result<HttpResponse, ProxyError> {
        let mut request = HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("token {}", self.token));
        if let Some(body) = body {
            request = request.header("Content-Type", "application/json").body(body);
        }
        self.proxy.http_request(request).await
    }

    /// Open the multiplexed channel socket for a kernel.
    ///
    /// No subprotocol is requested, so the server speaks the JSON text
    /// framing the broker relays as-is.
    pub async fn open_kernel_channel(&self, kernel_id: &str) -> Result<WsConnection, ProxyError> {
        let request = WsOpenRequest {
            url: format!("{}/api/kernels/{}/channels", self.ws_url, kernel_id),
            protocol: None,
            headers: [("Authorization".to_string(), format!("token {}", self.token))].into(),
        };
        let connection = self.proxy.websocket_open(request).await?;
        self.sockets.lock().insert(connection.id().clone());
        tracing::info!(
            runtime = %self.runtime_id,
            kernel = kernel_id,
            id = %connection.id(),
            "kernel channel opened"
        );
        Ok(connection)
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
