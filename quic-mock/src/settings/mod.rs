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

//! Configuration for mock QUIC connections and listeners.

mod quic;

use std::fmt;
use std::net::SocketAddr;

pub use self::quic::*;

/// The address a client connection dials.
///
/// Only endpoints on `127.0.0.1` can be reached. A host name is resolved
/// when the connection is established and must resolve to the IPv4 loopback
/// address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteEndpoint {
    /// A resolved socket address.
    Addr(SocketAddr),
    /// A host name and port, resolved at connect time.
    Host {
        /// DNS name of the peer, e.g. `localhost`.
        host: String,
        /// Port of the peer's listener.
        port: u16,
    },
}

impl From<SocketAddr> for RemoteEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::Addr(addr)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Addr(addr) => write!(f, "{addr}"),
            Self::Host { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Combined configuration parameters required to establish a client
/// connection.
///
/// Use [`ConnectionParams::new_client`] to construct them. The parameters can
/// be modified freely after construction.
#[derive(Clone, Debug)]
#[non_exhaustive] // force use of constructor functions
pub struct ConnectionParams {
    /// Mock QUIC connection settings.
    pub settings: MockQuicSettings,
    /// The listener to connect to.
    pub remote_endpoint: RemoteEndpoint,
    /// The address the client reports as its own. An ephemeral mock port on
    /// `127.0.0.1` is assigned when unset.
    pub local_endpoint: Option<SocketAddr>,
}

impl ConnectionParams {
    /// Creates [`ConnectionParams`] for a client dialing `remote_endpoint`.
    #[inline]
    pub fn new_client(
        remote_endpoint: impl Into<RemoteEndpoint>, settings: MockQuicSettings,
    ) -> Self {
        Self {
            settings,
            remote_endpoint: remote_endpoint.into(),
            local_endpoint: None,
        }
    }
}

/// Configuration parameters for a [`MockListener`](crate::quic::MockListener).
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ListenerParams {
    /// Mock QUIC settings. The stream limits apply to every accepted
    /// connection.
    pub settings: MockQuicSettings,
    /// Must be `127.0.0.1:0`; the listener is assigned a mock port.
    pub listen_endpoint: SocketAddr,
}

impl ListenerParams {
    /// Creates [`ListenerParams`] binding `listen_endpoint`.
    #[inline]
    pub fn new(listen_endpoint: SocketAddr, settings: MockQuicSettings) -> Self {
        Self {
            settings,
            listen_endpoint,
        }
    }
}
