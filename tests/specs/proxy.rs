// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connectivity proxy specs

use crate::prelude::*;
use nbr_engine::ProxyError;
use nbr_wire::WsOpenRequest;

fn kernel_socket() -> WsOpenRequest {
    WsOpenRequest {
        url: "wss://ingress.test/pod-1/api/kernels/k1/channels".into(),
        protocol: None,
        headers: Default::default(),
    }
}

#[tokio::test]
async fn send_after_close_is_connection_not_found() {
    let (proxy, broker) = proxy();
    let socket = proxy.websocket_open(kernel_socket()).await.unwrap();
    let id = socket.id().clone();
    proxy.websocket_send(&id, "{}").await.unwrap();

    proxy.websocket_close(&id, None, None).await.unwrap();
    let err = proxy.websocket_send(&id, "{}").await.unwrap_err();

    assert!(matches!(err, ProxyError::ConnectionNotFound(ref missing) if *missing == id));
    assert_eq!(err.to_string(), format!("connection not found: {id}"));
    assert_eq!(broker.sent().len(), 1);
}

#[tokio::test]
async fn runtime_binding_routes_http_through_broker() {
    let (proxy, broker) = proxy();
    let handle = proxy.bind(&RuntimeRecord::builder("pod-1").build()).unwrap();

    let response = handle.http("GET", "/api/kernels", None).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(broker.http_count("https://ingress.test/pod-1/api/kernels"), 1);
}
