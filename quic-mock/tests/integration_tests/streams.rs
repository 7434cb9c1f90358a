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

use quic_mock::quic::STREAM_ID_INCREMENT;
use std::io::Read;
use std::io::Write;

#[tokio::test]
async fn ping_pong() {
    let pair = connect_pair().await;

    let client_stream = pair.client.open_bidirectional_stream().unwrap();
    within(client_stream.write_with_fin(b"ping", false))
        .await
        .unwrap();

    let server_stream = within(pair.server.accept_stream()).await.unwrap();
    assert!(!server_stream.is_initiator());

    let mut buf = [0u8; 16];
    let n = within(server_stream.read(&mut buf)).await.unwrap();
    assert_eq!(&buf[..n], b"ping");

    within(server_stream.write_with_fin(b"pong", true))
        .await
        .unwrap();

    let n = within(client_stream.read(&mut buf)).await.unwrap();
    assert_eq!(&buf[..n], b"pong");
    assert_eq!(within(client_stream.read(&mut buf)).await, Ok(0));
}

#[tokio::test]
async fn stream_ids_are_partitioned_by_initiator_and_kind() {
    let pair = connect_pair().await;

    let mut client_bidi = vec![];
    let mut client_uni = vec![];
    let mut server_bidi = vec![];
    let mut server_uni = vec![];
    for _ in 0..3 {
        client_bidi.push(pair.client.open_bidirectional_stream().unwrap());
        client_uni.push(pair.client.open_unidirectional_stream().unwrap());
        server_bidi.push(pair.server.open_bidirectional_stream().unwrap());
        server_uni.push(pair.server.open_unidirectional_stream().unwrap());
    }

    for (streams, residue) in [
        (&client_bidi, 0),
        (&server_bidi, 1),
        (&client_uni, 2),
        (&server_uni, 3),
    ] {
        let ids: Vec<u64> = streams.iter().map(MockStream::id).collect();

        assert!(ids.iter().all(|id| id % 4 == residue), "{ids:?}");
        assert!(
            ids.windows(2).all(|w| w[1] == w[0] + STREAM_ID_INCREMENT),
            "{ids:?}"
        );
    }

    assert!(client_uni.iter().all(|s| s.kind() == StreamKind::Unidirectional));
    assert!(server_bidi.iter().all(|s| s.kind() == StreamKind::Bidirectional));
}

#[tokio::test]
async fn streams_are_accepted_in_open_order() {
    let pair = connect_pair().await;

    let a = pair.client.open_bidirectional_stream().unwrap();
    let b = pair.client.open_bidirectional_stream().unwrap();
    let c = pair.client.open_unidirectional_stream().unwrap();

    for expected in [a.id(), b.id(), c.id()] {
        let accepted = within(pair.server.accept_stream()).await.unwrap();
        assert_eq!(accepted.id(), expected);
    }
}

#[tokio::test]
async fn accept_waits_for_the_peer_to_open() {
    let pair = connect_pair().await;

    assert_pending(pair.server.accept_stream()).await;

    let opened = pair.client.open_bidirectional_stream().unwrap();
    let accepted = within(pair.server.accept_stream()).await.unwrap();
    assert_eq!(accepted.id(), opened.id());
}

#[tokio::test]
async fn unidirectional_streams_only_flow_from_the_initiator() {
    let pair = connect_pair().await;

    let sender = pair.server.open_unidirectional_stream().unwrap();
    assert!(sender.can_write());
    assert!(!sender.can_read());
    assert!(matches!(
        sender.read(&mut [0u8; 4]).await,
        Err(QuicError::NotSupported(_))
    ));

    within(sender.write_with_fin(b"one way", true)).await.unwrap();

    let receiver = within(pair.client.accept_stream()).await.unwrap();
    assert!(receiver.can_read());
    assert!(!receiver.can_write());
    assert!(matches!(
        receiver.write(b"back").await,
        Err(QuicError::NotSupported(_))
    ));
    assert!(matches!(
        receiver.wait_for_write_completion().await,
        Err(QuicError::NotSupported(_))
    ));

    assert_eq!(within(read_to_end(&receiver)).await.unwrap(), b"one way");
}

#[tokio::test]
async fn writes_wait_for_the_reader() {
    let mut client_settings = MockQuicSettings::default();
    client_settings.max_stream_buffer_size = 4;
    let pair =
        connect_pair_with(MockQuicSettings::default(), client_settings).await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    let payload: Vec<u8> = (0..64).collect();
    let (written, read) = within(async {
        tokio::join!(local.write_with_fin(&payload, true), read_to_end(&remote))
    })
    .await;

    written.unwrap();
    assert_eq!(read.unwrap(), payload);
}

#[tokio::test]
async fn write_after_fin_fails() {
    let pair = connect_pair().await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    within(local.write_with_fin(b"done", true)).await.unwrap();
    within(local.wait_for_write_completion()).await.unwrap();

    assert_eq!(local.write(b"more").await, Err(QuicError::StreamFinished));
    assert_eq!(within(read_to_end(&remote)).await.unwrap(), b"done");
}

#[tokio::test]
async fn abort_read_stops_the_peer_writer() {
    let pair = connect_pair().await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    within(local.write(b"unwanted")).await.unwrap();
    remote.abort_read(5);

    assert_eq!(
        local.write(b"more").await,
        Err(QuicError::StreamAborted { error_code: 5 })
    );
    assert_eq!(
        within(local.wait_for_write_completion()).await,
        Err(QuicError::StreamAborted { error_code: 5 })
    );
    assert_eq!(
        remote.read(&mut [0u8; 8]).await,
        Err(QuicError::OperationAborted)
    );

    // The other direction is unaffected.
    within(remote.write_with_fin(b"still here", true)).await.unwrap();
    assert_eq!(within(read_to_end(&local)).await.unwrap(), b"still here");
}

#[tokio::test]
async fn abort_write_ends_the_peer_reader() {
    let pair = connect_pair().await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    within(local.write(b"partial")).await.unwrap();
    local.abort_write(9);

    // Buffered data is still delivered before the abort surfaces.
    let mut buf = [0u8; 16];
    let n = within(remote.read(&mut buf)).await.unwrap();
    assert_eq!(&buf[..n], b"partial");
    assert_eq!(
        within(remote.read(&mut buf)).await,
        Err(QuicError::StreamAborted { error_code: 9 })
    );

    assert_eq!(local.write(b"more").await, Err(QuicError::OperationAborted));
    assert_eq!(
        within(local.wait_for_write_completion()).await,
        Err(QuicError::StreamAborted { error_code: 9 })
    );
}

#[tokio::test]
async fn abort_wakes_a_blocked_reader() {
    let pair = connect_pair().await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    let mut buf = [0u8; 8];
    let (read, ()) = within(async {
        tokio::join!(remote.read(&mut buf), async {
            tokio::time::sleep(PENDING_GRACE).await;
            local.abort_write(11);
        })
    })
    .await;

    assert_eq!(read, Err(QuicError::StreamAborted { error_code: 11 }));
}

#[tokio::test]
async fn dropped_write_cancels_later_writes() {
    let mut client_settings = MockQuicSettings::default();
    client_settings.max_stream_buffer_size = 4;
    let pair =
        connect_pair_with(MockQuicSettings::default(), client_settings).await;
    let (local, _remote) = open_and_accept(&pair.client, &pair.server).await;

    // Nobody reads, so this write can't finish.
    assert_pending(local.write(b"more than four bytes")).await;

    assert_eq!(local.write(b"x").await, Err(QuicError::Cancelled));
}

#[tokio::test]
async fn shutdown_finishes_the_stream() {
    let pair = connect_pair().await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    within(local.write(b"bye")).await.unwrap();
    local.shutdown().unwrap();
    local.shutdown().unwrap();

    within(local.wait_for_write_completion()).await.unwrap();
    assert_eq!(within(read_to_end(&remote)).await.unwrap(), b"bye");
}

#[tokio::test]
async fn disposed_stream_rejects_io() {
    let pair = connect_pair().await;
    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;

    local.dispose();
    local.dispose();

    assert_eq!(local.write(b"x").await, Err(QuicError::Disposed));
    assert_eq!(local.read(&mut [0u8; 1]).await, Err(QuicError::Disposed));
    assert_eq!(local.shutdown(), Err(QuicError::Disposed));

    // Disposing shut the stream down gracefully.
    assert_eq!(within(read_to_end(&remote)).await.unwrap(), b"");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_io_from_plain_threads() {
    let pair = connect_pair().await;
    let (mut local, mut remote) =
        open_and_accept(&pair.client, &pair.server).await;

    let payload: Vec<u8> = (0..100_000u32).map(|i| i as u8).collect();

    let writer = tokio::task::spawn_blocking({
        let payload = payload.clone();
        move || {
            local.write_all(&payload).unwrap();
            local.flush().unwrap();
            local.shutdown().unwrap();
        }
    });
    let reader = tokio::task::spawn_blocking(move || {
        let mut out = Vec::new();
        remote.read_to_end(&mut out).unwrap();
        out
    });

    within(writer).await.unwrap();
    assert_eq!(within(reader).await.unwrap(), payload);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blocking_io_maps_errors() {
    let pair = connect_pair().await;
    let (local, mut remote) = open_and_accept(&pair.client, &pair.server).await;

    local.abort_write(3);

    let err = tokio::task::spawn_blocking(move || {
        Read::read(&mut remote, &mut [0u8; 8]).unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(err.kind(), std::io::ErrorKind::ConnectionReset);
}
