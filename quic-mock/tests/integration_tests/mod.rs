// Copyright (C) 2025, Cloudflare, Inc.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright notice,
//       this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above copyright
//       notice, this list of conditions and the following disclaimer in the
//       documentation and/or other materials provided with the distribution.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS
// IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO,
// THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR
// PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR
// CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL,
// EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO,
// PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE, DATA, OR
// PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF
// LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING
// NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE OF THIS
// SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use crate::fixtures::*;

use foundations::telemetry::with_test_telemetry;
use foundations::telemetry::TestTelemetryContext;
use std::net::SocketAddr;

pub mod stream_limits;
pub mod streams;

#[tokio::test]
async fn handshake_negotiates_first_alpn() {
    let listener = start_listener(MockQuicSettings::default());

    let mut client_settings = MockQuicSettings::default();
    client_settings.alpn = vec![b"moq-00".to_vec(), b"h3".to_vec()];
    let client = client_for(&listener, client_settings);

    within(client.connect()).await.unwrap();
    let server = within(listener.accept_connection()).await.unwrap();

    assert!(client.is_connected());
    assert!(server.is_connected());
    assert_eq!(client.negotiated_application_protocol().unwrap(), b"moq-00");
    assert_eq!(server.negotiated_application_protocol().unwrap(), b"moq-00");

    assert_eq!(client.remote_endpoint(), Some(listener.listen_endpoint()));
    assert_eq!(server.local_endpoint(), Some(listener.listen_endpoint()));
    assert_eq!(server.remote_endpoint(), client.local_endpoint());
}

#[tokio::test]
async fn explicit_local_endpoint_is_reported_to_the_server() {
    let listener = start_listener(MockQuicSettings::default());
    let local: SocketAddr = "127.0.0.1:50123".parse().unwrap();

    let mut params = ConnectionParams::new_client(
        listener.listen_endpoint(),
        MockQuicSettings::default(),
    );
    params.local_endpoint = Some(local);
    let client = MockConnection::new_client(params);

    within(client.connect()).await.unwrap();
    let server = within(listener.accept_connection()).await.unwrap();

    assert_eq!(server.remote_endpoint(), Some(local));
}

#[tokio::test]
async fn connect_by_host_name() {
    let listener = start_listener(MockQuicSettings::default());
    let remote = RemoteEndpoint::Host {
        host: "localhost".to_string(),
        port: listener.listen_endpoint().port(),
    };
    let client = MockConnection::new_client(ConnectionParams::new_client(
        remote,
        MockQuicSettings::default(),
    ));

    within(client.connect()).await.unwrap();
    within(listener.accept_connection()).await.unwrap();
}

#[tokio::test]
async fn connect_twice_fails() {
    let pair = connect_pair().await;

    assert_eq!(pair.client.connect().await, Err(QuicError::AlreadyConnected));
}

#[tokio::test]
async fn connect_without_listener_fails() {
    let listener = start_listener(MockQuicSettings::default());
    let addr = listener.listen_endpoint();
    drop(listener);

    let client = MockConnection::new_client(ConnectionParams::new_client(
        addr,
        MockQuicSettings::default(),
    ));

    assert_eq!(client.connect().await, Err(QuicError::ListenerNotFound(addr)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn full_backlog_refuses_connections() {
    let mut settings = MockQuicSettings::default();
    settings.listen_backlog = 1;
    let listener = start_listener(settings);
    let addr = listener.listen_endpoint();

    let first = client_for(&listener, MockQuicSettings::default());
    within(first.connect()).await.unwrap();

    let second = client_for(&listener, MockQuicSettings::default());
    assert_eq!(second.connect().await, Err(QuicError::ConnectionRefused(addr)));
    assert!(!second.is_connected());

    // Accepting frees up the backlog again.
    within(listener.accept_connection()).await.unwrap();
    within(second.connect()).await.unwrap();
}

#[tokio::test]
async fn listener_dispose_aborts_unaccepted_connections() {
    let listener = start_listener(MockQuicSettings::default());
    let client = client_for(&listener, MockQuicSettings::default());
    within(client.connect()).await.unwrap();

    listener.dispose();

    assert_eq!(
        within(client.accept_stream()).await.unwrap_err(),
        QuicError::OperationAborted
    );
    assert_eq!(
        client.open_bidirectional_stream().unwrap_err(),
        QuicError::OperationAborted
    );
}

#[with_test_telemetry(tokio::test)]
async fn lifecycle_is_logged(cx: TestTelemetryContext) {
    let pair = connect_pair().await;
    pair.client.close(42);

    let messages: Vec<_> = cx
        .log_records()
        .iter()
        .map(|record| record.message.clone())
        .collect();

    for expected in [
        "mock listener bound",
        "mock connection established",
        "mock connection accepted",
        "mock connection closed",
    ] {
        assert!(
            messages.iter().any(|m| m.contains(expected)),
            "missing log line {expected:?} in {messages:?}"
        );
    }
}
