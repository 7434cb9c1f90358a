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

use std::io;
use std::net::SocketAddr;

use super::StreamKind;

/// Errors reported by mock QUIC connections, listeners and streams.
///
/// Aborts carry the application error code the peer supplied. An abort
/// without a code (a local close or a disposed handle) is reported as
/// [`QuicError::OperationAborted`].
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuicError {
    /// The peer's stream budget for this kind of stream is exhausted.
    #[error("no available {kind} stream")]
    NoAvailableStreams { kind: StreamKind },
    /// Nothing listens on the target endpoint.
    #[error("could not find listener on {0}")]
    ListenerNotFound(SocketAddr),
    /// The listener's backlog is full or the listener went away.
    #[error("connection refused by {0}")]
    ConnectionRefused(SocketAddr),
    /// The endpoint is not usable by the loopback transport.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// A configuration value is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The client connection has not been connected yet.
    #[error("connection is not connected")]
    NotConnected,
    /// `connect` was called on an established connection.
    #[error("connection is already connected")]
    AlreadyConnected,
    /// The handle was disposed.
    #[error("object has been disposed")]
    Disposed,
    /// The operation was aborted without an application error code.
    #[error("operation aborted")]
    OperationAborted,
    /// The peer closed the connection with an application error code.
    #[error("connection aborted by peer with error code {error_code}")]
    ConnectionAborted { error_code: u64 },
    /// The peer aborted the stream with an application error code.
    #[error("stream aborted by peer with error code {error_code}")]
    StreamAborted { error_code: u64 },
    /// The stream has no half for this direction.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
    /// A previous write on the stream was cancelled.
    #[error("writes on this stream were cancelled")]
    Cancelled,
    /// The sending half of the stream was already finished.
    #[error("stream was already finished")]
    StreamFinished,
}

// Best-effort mapping onto io::ErrorKind so the mock can stand in for socket
// based transports behind io::Result APIs.
impl From<QuicError> for io::Error {
    fn from(err: QuicError) -> Self {
        use QuicError::*;

        let kind = match &err {
            NoAvailableStreams { .. } => io::ErrorKind::WouldBlock,
            ListenerNotFound(_) | ConnectionRefused(_) =>
                io::ErrorKind::ConnectionRefused,
            InvalidEndpoint(_) | InvalidArgument(_) =>
                io::ErrorKind::InvalidInput,
            NotConnected => io::ErrorKind::NotConnected,
            AlreadyConnected => io::ErrorKind::AlreadyExists,
            Disposed | StreamFinished => io::ErrorKind::BrokenPipe,
            OperationAborted | ConnectionAborted { .. } =>
                io::ErrorKind::ConnectionAborted,
            StreamAborted { .. } => io::ErrorKind::ConnectionReset,
            NotSupported(_) => io::ErrorKind::Unsupported,
            Cancelled => io::ErrorKind::Interrupted,
        };

        Self::new(kind, err)
    }
}
