use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::OnceLock;

use dashmap::DashMap;
use foundations::telemetry::log;

use super::super::limit::PeerStreamLimit;
use super::super::queue::StreamQueue;
use super::super::stream::StreamState;
use super::super::QuicError;
use super::super::Role;

/// What a connecting client hands to a listener.
#[derive(Debug)]
pub(crate) struct ConnectRequest {
    pub(crate) application_protocol: Vec<u8>,
    pub(crate) client_endpoint: SocketAddr,
    pub(crate) client_stream_limit: PeerStreamLimit,
    pub(crate) stream_buffer_size: usize,
}

/// The state of one connection, shared by the client handle, the server handle
/// and every stream opened on either of them.
///
/// Fields that exist once per side are reached through accessors keyed by
/// [`Role`].
#[derive(Debug)]
pub(crate) struct ConnectionState {
    application_protocol: Vec<u8>,
    client_endpoint: SocketAddr,
    server_endpoint: SocketAddr,

    client_initiated: StreamQueue,
    server_initiated: StreamQueue,
    streams: DashMap<u64, Arc<StreamState>>,

    // What each side is willing to accept from its peer.
    client_stream_limit: PeerStreamLimit,
    server_stream_limit: PeerStreamLimit,

    client_error_code: OnceLock<u64>,
    server_error_code: OnceLock<u64>,
    closed: AtomicBool,

    stream_buffer_size: usize,
}

impl ConnectionState {
    pub(crate) fn new(
        request: ConnectRequest, server_endpoint: SocketAddr,
        server_stream_limit: PeerStreamLimit,
    ) -> Self {
        Self {
            application_protocol: request.application_protocol,
            client_endpoint: request.client_endpoint,
            server_endpoint,
            client_initiated: StreamQueue::default(),
            server_initiated: StreamQueue::default(),
            streams: DashMap::new(),
            client_stream_limit: request.client_stream_limit,
            server_stream_limit,
            client_error_code: OnceLock::new(),
            server_error_code: OnceLock::new(),
            closed: AtomicBool::new(false),
            stream_buffer_size: request.stream_buffer_size,
        }
    }

    pub(crate) fn application_protocol(&self) -> &[u8] {
        &self.application_protocol
    }

    pub(crate) fn endpoint(&self, role: Role) -> SocketAddr {
        match role {
            Role::Client => self.client_endpoint,
            Role::Server => self.server_endpoint,
        }
    }

    /// The budget `role` grants its peer.
    pub(crate) fn stream_limit(&self, role: Role) -> &PeerStreamLimit {
        match role {
            Role::Client => &self.client_stream_limit,
            Role::Server => &self.server_stream_limit,
        }
    }

    /// Streams opened by `role` that its peer hasn't accepted yet.
    pub(crate) fn initiated_streams(&self, role: Role) -> &StreamQueue {
        match role {
            Role::Client => &self.client_initiated,
            Role::Server => &self.server_initiated,
        }
    }

    /// The code `role` closed the connection with, if any.
    pub(crate) fn error_code(&self, role: Role) -> Option<u64> {
        match role {
            Role::Client => self.client_error_code.get(),
            Role::Server => self.server_error_code.get(),
        }
        .copied()
    }

    fn record_error_code(&self, role: Role, error_code: u64) {
        let slot = match role {
            Role::Client => &self.client_error_code,
            Role::Server => &self.server_error_code,
        };
        let _ = slot.set(error_code);
    }

    pub(crate) fn stream_buffer_size(&self) -> usize {
        self.stream_buffer_size
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The error an operation that needs an open connection fails with once
    /// the connection is gone, as observed by `role`.
    pub(crate) fn closed_error(&self, role: Role) -> QuicError {
        match self.error_code(role.peer()) {
            Some(error_code) => QuicError::ConnectionAborted { error_code },
            None => QuicError::OperationAborted,
        }
    }

    pub(crate) fn register_stream(&self, stream: Arc<StreamState>) {
        self.streams.insert(stream.id(), stream);
    }

    /// Returns the admission slot `stream` took from its acceptor's budget.
    /// Only the first call per stream has an effect.
    pub(crate) fn release_admission(&self, stream: &StreamState) {
        if stream.take_admission() {
            self.stream_limit(stream.initiator().peer())
                .for_kind(stream.kind())
                .decrement();
        }
    }

    /// Tears the connection down on behalf of `role`. Only the first call has
    /// an effect.
    ///
    /// Streams nobody accepted are abandoned. Every other stream is
    /// terminated: blocked readers and writers wake up, and completion
    /// waiters fail with [`QuicError::ConnectionAborted`], or with
    /// [`QuicError::OperationAborted`] if no `error_code` is given.
    pub(crate) fn terminate(&self, role: Role, error_code: Option<u64>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(error_code) = error_code {
            self.record_error_code(role, error_code);
        }

        let failure = match error_code {
            Some(error_code) => QuicError::ConnectionAborted { error_code },
            None => QuicError::OperationAborted,
        };

        let mut abandoned = 0;
        for initiator in [Role::Client, Role::Server] {
            for stream in self.initiated_streams(initiator).close_and_drain() {
                stream.abandon(&failure);
                abandoned += 1;
            }
        }

        for stream in self.streams.iter() {
            stream.terminate(&failure);
        }

        log::debug!("mock connection closed";
            "role" => role.as_str(),
            "error_code" => ?error_code,
            "streams" => self.streams.len(),
            "abandoned_streams" => abandoned);
    }
}
