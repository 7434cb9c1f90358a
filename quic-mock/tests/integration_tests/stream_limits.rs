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

#[tokio::test]
async fn admission_round_trip() {
    const MAX_STREAMS: u64 = 3;

    let pair = connect_pair_with(
        settings_with_bidi_limit(MAX_STREAMS),
        MockQuicSettings::default(),
    )
    .await;
    assert_eq!(
        pair.client.remote_available_bidirectional_stream_count(),
        Ok(MAX_STREAMS)
    );

    let mut open = (0..MAX_STREAMS)
        .map(|_| pair.client.open_bidirectional_stream().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(pair.client.remote_available_bidirectional_stream_count(), Ok(0));
    assert_eq!(
        pair.client.open_bidirectional_stream().unwrap_err(),
        QuicError::NoAvailableStreams {
            kind: StreamKind::Bidirectional
        }
    );

    // Unidirectional streams have their own budget.
    pair.client.open_unidirectional_stream().unwrap();

    // Only the accepting end gives the slot back.
    let finished = open.pop().unwrap();
    finished.shutdown().unwrap();
    drop(finished);
    assert_eq!(pair.client.remote_available_bidirectional_stream_count(), Ok(0));

    let accepted = within(pair.server.accept_stream()).await.unwrap();
    accepted.shutdown().unwrap();
    assert_eq!(pair.client.remote_available_bidirectional_stream_count(), Ok(1));

    pair.client.open_bidirectional_stream().unwrap();
    assert_eq!(
        pair.client.open_bidirectional_stream().unwrap_err(),
        QuicError::NoAvailableStreams {
            kind: StreamKind::Bidirectional
        }
    );
}

#[tokio::test]
async fn budget_is_returned_once_per_stream() {
    let pair =
        connect_pair_with(settings_with_bidi_limit(2), MockQuicSettings::default())
            .await;

    let (local, remote) = open_and_accept(&pair.client, &pair.server).await;
    assert_eq!(pair.client.remote_available_bidirectional_stream_count(), Ok(1));

    // The acceptor shutting down and dropping releases a single slot.
    local.shutdown().unwrap();
    remote.shutdown().unwrap();
    drop(local);
    drop(remote);

    assert_eq!(pair.client.remote_available_bidirectional_stream_count(), Ok(2));
}

#[tokio::test]
async fn finishing_the_opening_end_keeps_the_slot() {
    let pair =
        connect_pair_with(settings_with_bidi_limit(1), MockQuicSettings::default())
            .await;

    let first = pair.client.open_bidirectional_stream().unwrap();
    within(first.write_with_fin(b"one", true)).await.unwrap();
    first.shutdown().unwrap();
    let first_id = first.id();
    drop(first);

    for _ in 0..4 {
        assert_eq!(
            pair.client.open_bidirectional_stream().unwrap_err(),
            QuicError::NoAvailableStreams {
                kind: StreamKind::Bidirectional
            }
        );
    }
    assert_pending(pair.client.wait_for_available_bidirectional_streams()).await;

    let accepted = within(pair.server.accept_stream()).await.unwrap();
    assert_eq!(accepted.id(), first_id);
    assert_eq!(within(read_to_end(&accepted)).await.unwrap(), b"one");
    drop(accepted);

    within(pair.client.wait_for_available_bidirectional_streams())
        .await
        .unwrap();
    let second = pair.client.open_bidirectional_stream().unwrap();
    assert_eq!(second.id(), first_id + 4);
}

#[tokio::test]
async fn waiting_opener_gets_the_freed_slot() {
    let pair =
        connect_pair_with(settings_with_bidi_limit(1), MockQuicSettings::default())
            .await;

    let first = pair.client.open_bidirectional_stream().unwrap();
    assert!(matches!(
        pair.client.open_bidirectional_stream(),
        Err(QuicError::NoAvailableStreams { .. })
    ));

    assert_pending(pair.client.wait_for_available_bidirectional_streams()).await;

    let (waited, ()) = within(async {
        tokio::join!(
            pair.client.wait_for_available_bidirectional_streams(),
            async {
                let accepted = pair.server.accept_stream().await.unwrap();
                assert_eq!(accepted.id(), first.id());
                accepted.shutdown().unwrap();
            }
        )
    })
    .await;

    waited.unwrap();
    let second = pair.client.open_bidirectional_stream().unwrap();
    assert_eq!(second.id(), first.id() + 4);
}

#[tokio::test]
async fn zero_budget_fails_without_waiting() {
    // The client grants the server no bidirectional streams at all.
    let pair =
        connect_pair_with(MockQuicSettings::default(), settings_with_bidi_limit(0))
            .await;

    assert_eq!(pair.server.remote_available_bidirectional_stream_count(), Ok(0));
    assert_eq!(
        within(async { pair.server.open_bidirectional_stream() })
            .await
            .unwrap_err(),
        QuicError::NoAvailableStreams {
            kind: StreamKind::Bidirectional
        }
    );
    assert_pending(pair.server.wait_for_available_bidirectional_streams()).await;

    // The other direction is governed by the server's settings.
    pair.client.open_bidirectional_stream().unwrap();
    pair.server.open_unidirectional_stream().unwrap();
}

#[tokio::test]
async fn peer_dispose_releases_waiters() {
    let pair =
        connect_pair_with(MockQuicSettings::default(), settings_with_bidi_limit(0))
            .await;

    let (waited, ()) = within(async {
        tokio::join!(
            pair.server.wait_for_available_bidirectional_streams(),
            async {
                tokio::time::sleep(PENDING_GRACE).await;
                pair.client.dispose();
            }
        )
    })
    .await;

    assert_eq!(waited, Err(QuicError::OperationAborted));
}

#[tokio::test]
async fn own_dispose_releases_waiters() {
    let pair =
        connect_pair_with(settings_with_bidi_limit(0), MockQuicSettings::default())
            .await;

    let (waited, ()) = within(async {
        tokio::join!(
            pair.client.wait_for_available_bidirectional_streams(),
            async {
                tokio::time::sleep(PENDING_GRACE).await;
                pair.client.dispose();
            }
        )
    })
    .await;

    assert_eq!(waited, Err(QuicError::OperationAborted));
    assert_eq!(
        pair.client.wait_for_available_bidirectional_streams().await,
        Err(QuicError::Disposed)
    );
}

#[tokio::test]
async fn unidirectional_limits_are_enforced() {
    let mut server_settings = MockQuicSettings::default();
    server_settings.max_unidirectional_streams = 1;
    let pair = connect_pair_with(server_settings, MockQuicSettings::default()).await;

    let first = pair.client.open_unidirectional_stream().unwrap();
    assert_eq!(
        pair.client.open_unidirectional_stream().unwrap_err(),
        QuicError::NoAvailableStreams {
            kind: StreamKind::Unidirectional
        }
    );
    assert_eq!(
        pair.client.remote_available_unidirectional_stream_count(),
        Ok(0)
    );

    first.dispose();
    assert_eq!(
        pair.client.remote_available_unidirectional_stream_count(),
        Ok(0)
    );

    within(pair.server.accept_stream()).await.unwrap().dispose();
    within(pair.client.wait_for_available_unidirectional_streams())
        .await
        .unwrap();
    pair.client.open_unidirectional_stream().unwrap();
}
