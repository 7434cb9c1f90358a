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

//! An in-process QUIC look-alike.
//!
//! A [`MockListener`] binds a mock port on `127.0.0.1` and registers itself in
//! a process-wide table. A client [`MockConnection`] finds the listener via
//! that table when it connects and hands it a shared connection state. Both
//! connection handles, and every [`MockStream`] opened on them, refer to that
//! one state; nothing is copied between the peers.
//!
//! # Streams
//!
//! Opening a stream consumes one unit of the *peer's* advertised budget for
//! that [`StreamKind`] and queues the stream for the peer to accept. Opening
//! never waits: when the budget is exhausted it fails with
//! [`QuicError::NoAvailableStreams`], and callers that want to wait use
//! `wait_for_available_*_streams` first. The budget is returned once the
//! accepting end shuts the stream down.
//!
//! Stream IDs follow QUIC's partitioning: the two low bits encode the
//! initiator and the directionality, so client- and server-initiated IDs of
//! either kind never collide.
//!
//! # Teardown
//!
//! Errors are pulled, not pushed. Closing a connection records the error code
//! on the shared state and wakes every blocked reader and writer; each of them
//! then inspects the state to decide which error to report. Connection-level
//! errors take precedence over stream-level ones.

use std::fmt;

mod connection;
mod error;
mod limit;
mod listener;
mod metrics;
mod queue;
mod signal;
mod stream;

pub use self::connection::MockConnection;
pub use self::error::QuicError;
pub use self::limit::PeerStreamLimit;
pub use self::limit::StreamLimit;
pub use self::listener::MockListener;
pub use self::stream::MockStream;

/// The distance between two consecutive stream IDs of the same initiator and
/// kind.
pub const STREAM_ID_INCREMENT: u64 = 4;

/// Which end of a connection a handle represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// The other end of the connection.
    #[inline]
    pub fn peer(self) -> Self {
        match self {
            Self::Client => Self::Server,
            Self::Server => Self::Client,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

/// The directionality of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Both peers can send.
    Bidirectional,
    /// Only the initiator can send.
    Unidirectional,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bidirectional => "bidirectional",
            Self::Unidirectional => "unidirectional",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first stream ID used by `initiator` for streams of `kind`.
#[inline]
pub fn initial_stream_id(initiator: Role, kind: StreamKind) -> u64 {
    match (initiator, kind) {
        (Role::Client, StreamKind::Bidirectional) => 0,
        (Role::Server, StreamKind::Bidirectional) => 1,
        (Role::Client, StreamKind::Unidirectional) => 2,
        (Role::Server, StreamKind::Unidirectional) => 3,
    }
}

/// The peer that opened the stream with the given ID.
#[inline]
pub fn stream_initiator(stream_id: u64) -> Role {
    if stream_id & 0x1 == 0 {
        Role::Client
    } else {
        Role::Server
    }
}

/// The directionality of the stream with the given ID.
#[inline]
pub fn stream_kind(stream_id: u64) -> StreamKind {
    if stream_id & 0x2 == 0 {
        StreamKind::Bidirectional
    } else {
        StreamKind::Unidirectional
    }
}
