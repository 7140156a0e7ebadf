// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker that performs real network I/O.
//!
//! HTTP goes through a shared `reqwest` client. Each WebSocket gets a reader
//! task that turns inbound frames into [`BrokerEvent`]s on the shared event
//! channel, and a writer task fed by an unbounded queue. A connection leaves
//! the registry on explicit close or when its reader sees close/error.

use super::{BrokerError, BrokerHandler, EVENT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use nbr_core::ConnectionId;
use nbr_wire::{
    BrokerEvent, BrokerReply, BrokerRequest, HttpRequest, HttpResponse, WsCloseRequest,
    WsOpenRequest, WsOpenResponse, WsSendRequest,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Registry = Arc<Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Message>>>>;

const NORMAL_CLOSE: u16 = 1000;

pub struct NetworkBroker {
    http: reqwest::Client,
    timeout: Duration,
    sockets: Registry,
    events: mpsc::Sender<BrokerEvent>,
}

impl NetworkBroker {
    /// Create a broker and the receiving end of its event channel.
    ///
    /// `timeout` bounds each HTTP round trip and each WebSocket handshake.
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<BrokerEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let broker = Self {
            http: reqwest::Client::new(),
            timeout,
            sockets: Arc::new(Mutex::new(HashMap::new())),
            events,
        };
        (broker, events_rx)
    }

    pub fn open_connections(&self) -> usize {
        self.sockets.lock().len()
    }

    async fn http_request(&self, request: HttpRequest) -> Result<HttpResponse, BrokerError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?;
        let mut builder = self.http.request(method, &request.url).timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| BrokerError::Http(e.to_string()))?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some((name.as_str().to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| BrokerError::Http(e.to_string()))?;
        tracing::debug!(url = %request.url, status = status.as_u16(), "http request complete");

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }

    async fn websocket_open(&self, request: WsOpenRequest) -> Result<WsOpenResponse, BrokerError> {
        let mut handshake = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?;
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?;
            handshake.headers_mut().insert(name, value);
        }
        if let Some(protocol) = &request.protocol {
            let value = HeaderValue::from_str(protocol)
                .map_err(|e| BrokerError::InvalidRequest(e.to_string()))?;
            handshake.headers_mut().insert(header::SEC_WEBSOCKET_PROTOCOL, value);
        }

        let connect = tokio_tungstenite::connect_async(handshake);
        let (socket, _) = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| {
                BrokerError::WebSocket(format!("handshake with {} timed out", request.url))
            })?
            .map_err(|e| BrokerError::WebSocket(e.to_string()))?;

        let id = ConnectionId::generate();
        let (sink, stream) = socket.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        self.sockets.lock().insert(id.clone(), outbound);

        tokio::spawn(pump_outbound(sink, outbound_rx));
        let sockets = Arc::clone(&self.sockets);
        tokio::spawn(pump_inbound(id.clone(), stream, sockets, self.events.clone()));
        tracing::info!(%id, url = %request.url, "websocket opened");
        Ok(WsOpenResponse { id })
    }

    fn websocket_send(&self, request: WsSendRequest) -> Result<(), BrokerError> {
        let sockets = self.sockets.lock();
        let outbound = sockets
            .get(&request.id)
            .ok_or_else(|| BrokerError::ConnectionNotFound(request.id.clone()))?;
        outbound
            .send(Message::Text(request.data.into()))
            .map_err(|_| BrokerError::ConnectionNotFound(request.id.clone()))
    }

    fn websocket_close(&self, request: WsCloseRequest) -> Result<(), BrokerError> {
        let outbound = self
            .sockets
            .lock()
            .remove(&request.id)
            .ok_or_else(|| BrokerError::ConnectionNotFound(request.id.clone()))?;
        send_close(&outbound, request.code, request.reason);
        tracing::info!(id = %request.id, "websocket close requested");
        Ok(())
    }

    fn close_all(&self) -> usize {
        let drained: Vec<_> = self.sockets.lock().drain().collect();
        for (_, outbound) in &drained {
            send_close(outbound, None, None);
        }
        drained.len()
    }
}

impl Drop for NetworkBroker {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[async_trait]
impl BrokerHandler for NetworkBroker {
    async fn handle(&self, request: BrokerRequest) -> Result<BrokerReply, BrokerError> {
        match request {
            BrokerRequest::HttpRequest(r) => self.http_request(r).await.map(BrokerReply::Http),
            BrokerRequest::WebsocketOpen(r) => {
                self.websocket_open(r).await.map(BrokerReply::Opened)
            }
            BrokerRequest::WebsocketSend(r) => self.websocket_send(r).map(|_| BrokerReply::Ack {}),
            BrokerRequest::WebsocketClose(r) => {
                self.websocket_close(r).map(|_| BrokerReply::Ack {})
            }
            BrokerRequest::WebsocketCloseAll => {
                let closed = self.close_all();
                tracing::info!(closed, "closed all websockets");
                Ok(BrokerReply::Ack {})
            }
        }
    }
}

fn send_close(
    outbound: &mpsc::UnboundedSender<Message>,
    code: Option<u16>,
    reason: Option<String>,
) {
    let frame = CloseFrame {
        code: CloseCode::from(code.unwrap_or(NORMAL_CLOSE)),
        reason: reason.unwrap_or_default().into(),
    };
    // Writer already gone means the socket is already down
    let _ = outbound.send(Message::Close(Some(frame)));
}

async fn pump_outbound(
    mut sink: SplitSink<Socket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            tracing::debug!(error = %e, "websocket write failed");
            break;
        }
        if closing {
            break;
        }
    }
}

async fn pump_inbound(
    id: ConnectionId,
    mut stream: SplitStream<Socket>,
    sockets: Registry,
    events: mpsc::Sender<BrokerEvent>,
) {
    let _ = events.send(BrokerEvent::open(id.clone())).await;

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let _ = events.send(BrokerEvent::message(id.clone(), text.as_str())).await;
            }
            Some(Ok(Message::Binary(data))) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                let _ = events.send(BrokerEvent::message(id.clone(), text)).await;
            }
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), Some(frame.reason.to_string())),
                    None => (None, None),
                };
                tracing::info!(%id, ?code, "websocket closed by peer");
                let _ = events.send(BrokerEvent::close(id.clone(), code, reason)).await;
                break;
            }
            Some(Ok(_)) => {} // ping/pong handled by tungstenite
            Some(Err(e)) => {
                tracing::warn!(%id, error = %e, "websocket error");
                let _ = events.send(BrokerEvent::error(id.clone(), e.to_string())).await;
                break;
            }
            None => {
                let _ = events.send(BrokerEvent::close(id.clone(), None, None)).await;
                break;
            }
        }
    }

    sockets.lock().remove(&id);
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
