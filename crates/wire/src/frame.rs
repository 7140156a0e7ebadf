// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::types::{
    BrokerEvent, HttpRequest, HttpResponse, WsCloseRequest, WsOpenRequest, WsOpenResponse,
    WsSendRequest,
};
use serde::{Deserialize, Serialize};

/// Operation requested of the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrokerRequest {
    #[serde(rename = "http/request")]
    HttpRequest(HttpRequest),
    #[serde(rename = "websocket/open")]
    WebsocketOpen(WsOpenRequest),
    #[serde(rename = "websocket/send")]
    WebsocketSend(WsSendRequest),
    #[serde(rename = "websocket/close")]
    WebsocketClose(WsCloseRequest),
    #[serde(rename = "websocket/closeAll")]
    WebsocketCloseAll,
}

impl BrokerRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::HttpRequest(_) => "http/request",
            Self::WebsocketOpen(_) => "websocket/open",
            Self::WebsocketSend(_) => "websocket/send",
            Self::WebsocketClose(_) => "websocket/close",
            Self::WebsocketCloseAll => "websocket/closeAll",
        }
    }
}

/// Successful result of a [`BrokerRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BrokerReply {
    Http(HttpResponse),
    Opened(WsOpenResponse),
    /// Send and close acknowledgements carry no payload
    Ack {},
}

/// Envelope for everything crossing the broker channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Frame {
    /// `method` and `params` sit beside `seq` at the top level
    Request {
        seq: u64,
        #[serde(flatten)]
        request: BrokerRequest,
    },
    Response {
        seq: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<BrokerReply>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Event {
        event: BrokerEvent,
    },
}

impl Frame {
    pub fn reply(seq: u64, outcome: Result<BrokerReply, String>) -> Self {
        match outcome {
            Ok(reply) => Self::Response { seq, result: Some(reply), error: None },
            Err(error) => Self::Response { seq, result: None, error: Some(error) },
        }
    }
}
