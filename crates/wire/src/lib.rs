// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker protocol between the UI-logic process and the network broker.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON [`Frame`]

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod types;
mod wire;

pub use frame::{BrokerReply, BrokerRequest, Frame};
pub use types::{
    BrokerEvent, EventKind, HttpRequest, HttpResponse, WsCloseRequest, WsOpenRequest,
    WsOpenResponse, WsSendRequest,
};
pub use wire::{
    decode, encode, read_frame, read_message, write_frame, write_message, ProtocolError,
    MAX_FRAME_BYTES,
};
