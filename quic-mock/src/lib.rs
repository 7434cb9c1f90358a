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

//! An in-process stand-in for a QUIC transport.
//!
//! quic-mock models the parts of QUIC that higher protocol layers depend on:
//! establishing a connection through a listener, multiplexed uni- and
//! bidirectional streams, per-direction stream budgets, graceful and abrupt
//! teardown, and how errors travel between the peers. There is no wire
//! format, no TLS and no congestion control. Both peers live in the same
//! process and share the connection state directly, which makes the
//! transport deterministic enough for unit tests.
//!
//! Only `127.0.0.1` is reachable. Listeners bind port 0 and are assigned a
//! mock port; no real sockets are opened.
//!
//! # Example
//!
//! ```
//! use quic_mock::ConnectionParams;
//! use quic_mock::ListenerParams;
//! use quic_mock::MockConnection;
//! use quic_mock::MockListener;
//! use quic_mock::MockQuicSettings;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> quic_mock::QuicResult<()> {
//! let listener = MockListener::bind(ListenerParams::new(
//!     "127.0.0.1:0".parse().unwrap(),
//!     MockQuicSettings::default(),
//! ))?;
//!
//! let client = MockConnection::new_client(ConnectionParams::new_client(
//!     listener.listen_endpoint(),
//!     MockQuicSettings::default(),
//! ));
//! client.connect().await?;
//! let server = listener.accept_connection().await?;
//!
//! let stream = client.open_bidirectional_stream()?;
//! stream.write_with_fin(b"ping", true).await?;
//!
//! let accepted = server.accept_stream().await?;
//! let mut buf = [0; 4];
//! assert_eq!(accepted.read(&mut buf).await?, 4);
//! assert_eq!(&buf, b"ping");
//!
//! client.close(0);
//! # Ok(())
//! # }
//! ```

pub mod quic;
mod result;
pub mod settings;

pub use stream_buffer;

pub use crate::quic::MockConnection;
pub use crate::quic::MockListener;
pub use crate::quic::MockStream;
pub use crate::quic::QuicError;
pub use crate::result::QuicResult;
pub use crate::result::QuicResultExt;
pub use crate::settings::ConnectionParams;
pub use crate::settings::ListenerParams;
pub use crate::settings::MockQuicSettings;
