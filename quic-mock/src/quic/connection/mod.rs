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

mod state;

use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::OnceLock;

use foundations::telemetry::log;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub(crate) use self::state::ConnectRequest;
pub(crate) use self::state::ConnectionState;

use super::limit::PeerStreamLimit;
use super::limit::StreamLimit;
use super::listener::is_mock_loopback;
use super::listener::next_mock_port;
use super::listener::ListenerHandle;
use super::metrics;
use super::metrics::mock_quic;
use super::stream::MockStream;
use super::stream::StreamState;
use super::initial_stream_id;
use super::QuicError;
use super::Role;
use super::StreamKind;
use super::STREAM_ID_INCREMENT;
use crate::settings::ConnectionParams;
use crate::settings::RemoteEndpoint;
use crate::QuicResult;

/// One end of a mock QUIC connection.
///
/// Client connections are created with [`MockConnection::new_client`] and
/// establish themselves with [`connect`](Self::connect). Server connections
/// come out of [`MockListener::accept_connection`] already connected.
///
/// Dropping a connection disposes it, which tears the connection down
/// without an error code if it is still open. Use [`close`](Self::close) to
/// send the peer an error code.
///
/// [`MockListener::accept_connection`]: super::MockListener::accept_connection
#[derive(Debug)]
pub struct MockConnection {
    role: Role,
    /// Only set for client connections.
    params: Option<ConnectionParams>,
    state: OnceLock<Arc<ConnectionState>>,
    connect_lock: Mutex<()>,
    next_bidirectional_id: AtomicU64,
    next_unidirectional_id: AtomicU64,
    disposed: AtomicBool,
    /// Cancelled on dispose; aborts this handle's pending waits.
    closed: CancellationToken,
}

impl MockConnection {
    /// Creates an unconnected client connection.
    pub fn new_client(params: ConnectionParams) -> Self {
        Self::new(Role::Client, Some(params))
    }

    pub(crate) fn new_server(state: Arc<ConnectionState>) -> Self {
        let conn = Self::new(Role::Server, None);
        let _ = conn.state.set(state);
        conn
    }

    fn new(role: Role, params: Option<ConnectionParams>) -> Self {
        Self {
            role,
            params,
            state: OnceLock::new(),
            connect_lock: Mutex::new(()),
            next_bidirectional_id: AtomicU64::new(initial_stream_id(
                role,
                StreamKind::Bidirectional,
            )),
            next_unidirectional_id: AtomicU64::new(initial_stream_id(
                role,
                StreamKind::Unidirectional,
            )),
            disposed: AtomicBool::new(false),
            closed: CancellationToken::new(),
        }
    }

    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        !self.disposed.load(Ordering::Acquire) && self.state.get().is_some()
    }

    /// This end's address. Unknown for a client that hasn't connected yet
    /// and wasn't given an explicit local endpoint.
    pub fn local_endpoint(&self) -> Option<SocketAddr> {
        match self.state.get() {
            Some(state) => Some(state.endpoint(self.role)),
            None => self.params.as_ref().and_then(|p| p.local_endpoint),
        }
    }

    /// The peer's address, once connected.
    pub fn remote_endpoint(&self) -> Option<SocketAddr> {
        self.state.get().map(|state| state.endpoint(self.role.peer()))
    }

    /// The application protocol both ends agreed on: the client's first
    /// configured ALPN.
    pub fn negotiated_application_protocol(&self) -> QuicResult<&[u8]> {
        Ok(self.connected_state()?.application_protocol())
    }

    fn check_disposed(&self) -> QuicResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(QuicError::Disposed);
        }
        Ok(())
    }

    fn connected_state(&self) -> QuicResult<&Arc<ConnectionState>> {
        self.check_disposed()?;
        self.state.get().ok_or(QuicError::NotConnected)
    }

    /// Establishes a client connection with the listener at the configured
    /// remote endpoint.
    ///
    /// This only queues the connection on the listener's backlog; it doesn't
    /// wait for the server to accept it.
    pub async fn connect(&self) -> QuicResult<()> {
        self.check_disposed()?;
        if self.state.get().is_some() {
            return Err(QuicError::AlreadyConnected);
        }

        let params = self
            .params
            .as_ref()
            .ok_or(QuicError::NotSupported("server connections can't connect"))?;
        let application_protocol = params
            .settings
            .alpn
            .first()
            .cloned()
            .ok_or(QuicError::InvalidArgument("no application protocol configured"))?;
        if params.settings.max_stream_buffer_size == 0 {
            return Err(QuicError::InvalidArgument(
                "max stream buffer size must be > 0",
            ));
        }

        let remote = resolve(&params.remote_endpoint).await?;

        let Some(listener) = ListenerHandle::find(remote) else {
            mock_quic::connections_refused(metrics::REFUSED_NO_LISTENER).inc();
            return Err(QuicError::ListenerNotFound(remote));
        };

        let _guard = self.connect_lock.lock();
        self.check_disposed()?;
        if self.state.get().is_some() {
            return Err(QuicError::AlreadyConnected);
        }

        let client_endpoint = params.local_endpoint.unwrap_or_else(|| {
            SocketAddr::from((Ipv4Addr::LOCALHOST, next_mock_port()))
        });
        let request = ConnectRequest {
            application_protocol,
            client_endpoint,
            client_stream_limit: PeerStreamLimit::new(
                params.settings.max_unidirectional_streams,
                params.settings.max_bidirectional_streams,
            ),
            stream_buffer_size: params.settings.max_stream_buffer_size,
        };

        let Some(state) = listener.try_connect(request) else {
            mock_quic::connections_refused(metrics::REFUSED_BACKLOG_FULL).inc();
            return Err(QuicError::ConnectionRefused(remote));
        };

        log::debug!("mock connection established";
            "local_addr" => client_endpoint, "peer_addr" => remote);

        let _ = self.state.set(state);
        Ok(())
    }

    /// Opens a unidirectional stream. See
    /// [`open_bidirectional_stream`](Self::open_bidirectional_stream).
    pub fn open_unidirectional_stream(&self) -> QuicResult<MockStream> {
        self.open_stream(StreamKind::Unidirectional)
    }

    /// Opens a bidirectional stream.
    ///
    /// Fails with [`QuicError::NoAvailableStreams`] right away if the peer's
    /// budget for bidirectional streams is used up. Use
    /// [`wait_for_available_bidirectional_streams`] to wait for budget
    /// first.
    ///
    /// [`wait_for_available_bidirectional_streams`]: Self::wait_for_available_bidirectional_streams
    pub fn open_bidirectional_stream(&self) -> QuicResult<MockStream> {
        self.open_stream(StreamKind::Bidirectional)
    }

    fn open_stream(&self, kind: StreamKind) -> QuicResult<MockStream> {
        let state = self.connected_state()?;
        if state.is_closed() {
            return Err(state.closed_error(self.role));
        }

        let limit = self.remote_limit(state, kind);
        if !limit.try_increment() {
            mock_quic::stream_admission_failures(kind.as_str()).inc();
            log::trace!("no stream budget left";
                "role" => self.role.as_str(), "kind" => kind.as_str(), "max" => limit.max_count());

            return Err(QuicError::NoAvailableStreams { kind });
        }

        let id = self.next_stream_id(kind);
        let stream = Arc::new(StreamState::new(
            id,
            kind,
            self.role,
            state.stream_buffer_size(),
        ));
        state.register_stream(Arc::clone(&stream));

        if let Err(stream) =
            state.initiated_streams(self.role).push(Arc::clone(&stream))
        {
            // Closed since the check above.
            let err = state.closed_error(self.role);
            stream.abandon(&err);
            state.release_admission(&stream);
            return Err(err);
        }

        mock_quic::streams_opened(kind.as_str()).inc();
        log::trace!("stream opened";
            "role" => self.role.as_str(), "stream_id" => id, "kind" => kind.as_str());

        Ok(MockStream::new(Arc::clone(state), stream, self.role))
    }

    fn next_stream_id(&self, kind: StreamKind) -> u64 {
        let counter = match kind {
            StreamKind::Bidirectional => &self.next_bidirectional_id,
            StreamKind::Unidirectional => &self.next_unidirectional_id,
        };
        counter.fetch_add(STREAM_ID_INCREMENT, Ordering::Relaxed)
    }

    fn remote_limit<'a>(
        &self, state: &'a ConnectionState, kind: StreamKind,
    ) -> &'a StreamLimit {
        state.stream_limit(self.role.peer()).for_kind(kind)
    }

    /// Waits for the next stream the peer opens.
    ///
    /// Streams are accepted in the order the peer opened them. Once the
    /// connection is torn down, fails with [`QuicError::ConnectionAborted`]
    /// if the peer closed it with an error code, and with
    /// [`QuicError::OperationAborted`] otherwise.
    pub async fn accept_stream(&self) -> QuicResult<MockStream> {
        let state = self.connected_state()?;

        let accepted = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(QuicError::OperationAborted),
            stream = state.initiated_streams(self.role.peer()).pop() => stream,
        };

        match accepted {
            Some(stream) if !state.is_closed() => {
                log::trace!("stream accepted";
                    "role" => self.role.as_str(), "stream_id" => stream.id());
                Ok(MockStream::new(Arc::clone(state), stream, self.role))
            },
            // Popped while the connection was being torn down.
            Some(stream) => {
                let err = state.closed_error(self.role);
                stream.abandon(&err);
                Err(err)
            },
            None => Err(state.closed_error(self.role)),
        }
    }

    /// Waits until the peer's budget allows opening a unidirectional stream.
    pub async fn wait_for_available_unidirectional_streams(
        &self,
    ) -> QuicResult<()> {
        self.wait_for_available_streams(StreamKind::Unidirectional)
            .await
    }

    /// Waits until the peer's budget allows opening a bidirectional stream.
    ///
    /// Budget that frees up is not reserved: a concurrent open may take it
    /// first, in which case the next open fails again.
    pub async fn wait_for_available_bidirectional_streams(
        &self,
    ) -> QuicResult<()> {
        self.wait_for_available_streams(StreamKind::Bidirectional)
            .await
    }

    async fn wait_for_available_streams(&self, kind: StreamKind) -> QuicResult<()> {
        let state = self.connected_state()?;
        let limit = self.remote_limit(state, kind);

        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(QuicError::OperationAborted),
            res = limit.wait_for_available_streams() => res,
        }
    }

    /// How many more unidirectional streams the peer accepts right now.
    pub fn remote_available_unidirectional_stream_count(&self) -> QuicResult<u64> {
        let state = self.connected_state()?;
        Ok(self
            .remote_limit(state, StreamKind::Unidirectional)
            .available_count())
    }

    /// How many more bidirectional streams the peer accepts right now.
    pub fn remote_available_bidirectional_stream_count(&self) -> QuicResult<u64> {
        let state = self.connected_state()?;
        Ok(self
            .remote_limit(state, StreamKind::Bidirectional)
            .available_count())
    }

    /// Closes the connection with `error_code` and disposes this handle.
    ///
    /// The peer's pending and future operations fail with
    /// [`QuicError::ConnectionAborted`] carrying `error_code`. Closing a
    /// connection that is already closed, by either end, has no effect beyond
    /// disposing this handle.
    pub fn close(&self, error_code: u64) {
        if let Some(state) = self.state.get() {
            state.terminate(self.role, Some(error_code));
        }
        self.dispose();
    }

    /// Releases this handle. Tears the connection down without an error code
    /// if it is still open. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        // Wait out a concurrent connect so its state doesn't leak.
        drop(self.connect_lock.lock());

        if let Some(state) = self.state.get() {
            state.terminate(self.role, None);
            state.stream_limit(self.role).close_waiters();
        }
        self.closed.cancel();

        log::trace!("mock connection disposed"; "role" => self.role.as_str());
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Resolves `endpoint` to an address a mock listener can be bound to.
async fn resolve(endpoint: &RemoteEndpoint) -> QuicResult<SocketAddr> {
    let addr = match endpoint {
        RemoteEndpoint::Addr(addr) => *addr,
        RemoteEndpoint::Host { host, port } => lookup_loopback(host, *port).await?,
    };

    if !is_mock_loopback(&addr) {
        return Err(QuicError::InvalidEndpoint(format!(
            "{addr} is not on {}",
            Ipv4Addr::LOCALHOST
        )));
    }

    Ok(addr)
}

async fn lookup_loopback(host: &str, port: u16) -> QuicResult<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port)).await.map_err(|e| {
        QuicError::InvalidEndpoint(format!("failed to resolve {host}: {e}"))
    })?;

    addrs.find(is_mock_loopback).ok_or_else(|| {
        QuicError::InvalidEndpoint(format!(
            "{host} does not resolve to {}",
            Ipv4Addr::LOCALHOST
        ))
    })
}
