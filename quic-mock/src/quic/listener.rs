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

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU16;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::LazyLock;

use dashmap::DashMap;
use foundations::telemetry::log;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::connection::ConnectRequest;
use super::connection::ConnectionState;
use super::limit::PeerStreamLimit;
use super::metrics::mock_quic;
use super::MockConnection;
use super::QuicError;
use super::Role;
use crate::settings::ListenerParams;
use crate::QuicResult;

/// Every bound listener, by mock port.
static LISTENERS: LazyLock<DashMap<u16, Arc<ListenerHandle>>> =
    LazyLock::new(DashMap::new);

static NEXT_MOCK_PORT: AtomicU16 = AtomicU16::new(1);

/// Hands out mock ports. Port 0 is never returned; the counter wraps around
/// after 65535.
pub(crate) fn next_mock_port() -> u16 {
    loop {
        let port = NEXT_MOCK_PORT.fetch_add(1, Ordering::Relaxed);
        if port != 0 {
            return port;
        }
    }
}

/// Whether `addr` is on the only host the mock transport knows.
pub(crate) fn is_mock_loopback(addr: &SocketAddr) -> bool {
    addr.ip() == IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// The registered half of a listener, through which clients connect.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    listen_endpoint: SocketAddr,
    max_unidirectional_streams: u64,
    max_bidirectional_streams: u64,
    /// Taken when the listener is disposed.
    backlog: Mutex<Option<mpsc::Sender<Arc<ConnectionState>>>>,
}

impl ListenerHandle {
    /// Looks up the listener bound to `addr`.
    pub(crate) fn find(addr: SocketAddr) -> Option<Arc<Self>> {
        if !is_mock_loopback(&addr) || addr.port() == 0 {
            return None;
        }

        LISTENERS.get(&addr.port()).map(|entry| Arc::clone(entry.value()))
    }

    /// Queues a new connection on the backlog. Returns `None` if the backlog
    /// is full or the listener is gone.
    pub(crate) fn try_connect(
        &self, request: ConnectRequest,
    ) -> Option<Arc<ConnectionState>> {
        let state = Arc::new(ConnectionState::new(
            request,
            self.listen_endpoint,
            PeerStreamLimit::new(
                self.max_unidirectional_streams,
                self.max_bidirectional_streams,
            ),
        ));

        let backlog = self.backlog.lock();
        let Some(tx) = backlog.as_ref() else {
            log::debug!("mock connection refused";
                "listen_addr" => self.listen_endpoint, "error" => "listener disposed");
            return None;
        };

        if let Err(err) = tx.try_send(Arc::clone(&state)) {
            log::debug!("mock connection refused";
                "listen_addr" => self.listen_endpoint, "error" => %err);
            return None;
        }

        mock_quic::connections_queued().inc();
        Some(state)
    }
}

/// Pending connections. Whatever is left when the listener goes away is torn
/// down so the clients don't wait forever.
#[derive(Debug)]
struct Backlog(mpsc::Receiver<Arc<ConnectionState>>);

impl Backlog {
    fn close_and_drain(&mut self) {
        self.0.close();
        while let Ok(state) = self.0.try_recv() {
            state.terminate(Role::Server, None);
        }
    }
}

impl Drop for Backlog {
    fn drop(&mut self) {
        self.close_and_drain();
    }
}

/// Accepts mock QUIC connections on `127.0.0.1`.
///
/// Binding assigns the listener a fresh mock port and makes it reachable for
/// [`MockConnection::connect`] at [`listen_endpoint`](Self::listen_endpoint).
/// Dropping the listener disposes it.
#[derive(Debug)]
pub struct MockListener {
    handle: Arc<ListenerHandle>,
    incoming: tokio::sync::Mutex<Backlog>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl MockListener {
    /// Binds a listener. `params.listen_endpoint` must be `127.0.0.1:0`.
    pub fn bind(params: ListenerParams) -> QuicResult<Self> {
        let requested = params.listen_endpoint;
        if !is_mock_loopback(&requested) {
            return Err(QuicError::InvalidEndpoint(format!(
                "{requested} is not on {}",
                Ipv4Addr::LOCALHOST
            )));
        }
        if requested.port() != 0 {
            return Err(QuicError::InvalidEndpoint(format!(
                "{requested}: mock listeners are assigned a port, bind port 0"
            )));
        }
        if params.settings.listen_backlog == 0 {
            return Err(QuicError::InvalidArgument("listen backlog must be > 0"));
        }

        let (tx, rx) = mpsc::channel(params.settings.listen_backlog);

        let handle = loop {
            use dashmap::Entry::*;

            let port = next_mock_port();
            if let Vacant(e) = LISTENERS.entry(port) {
                let handle = Arc::new(ListenerHandle {
                    listen_endpoint: SocketAddr::new(requested.ip(), port),
                    max_unidirectional_streams: params
                        .settings
                        .max_unidirectional_streams,
                    max_bidirectional_streams: params
                        .settings
                        .max_bidirectional_streams,
                    backlog: Mutex::new(Some(tx)),
                });
                e.insert(Arc::clone(&handle));
                break handle;
            }
        };

        mock_quic::active_listeners().inc();
        log::debug!("mock listener bound";
            "listen_addr" => handle.listen_endpoint,
            "backlog" => params.settings.listen_backlog);

        Ok(Self {
            handle,
            incoming: tokio::sync::Mutex::new(Backlog(rx)),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        })
    }

    /// The address clients connect to.
    #[inline]
    pub fn listen_endpoint(&self) -> SocketAddr {
        self.handle.listen_endpoint
    }

    /// Waits for the next queued connection and returns its server end.
    ///
    /// Fails with [`QuicError::Disposed`] once the listener is disposed,
    /// including for calls that are already waiting.
    pub async fn accept_connection(&self) -> QuicResult<MockConnection> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(QuicError::Disposed);
        }

        let accepted = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            state = async { self.incoming.lock().await.0.recv().await } => state,
        };
        let Some(state) = accepted else {
            // `dispose` can't drain while an accept holds the backlog.
            if let Ok(mut backlog) = self.incoming.try_lock() {
                backlog.close_and_drain();
            }
            return Err(QuicError::Disposed);
        };

        log::debug!("mock connection accepted";
            "listen_addr" => self.handle.listen_endpoint,
            "peer_addr" => state.endpoint(Role::Client));

        Ok(MockConnection::new_server(state))
    }

    /// Unregisters the listener and fails pending accepts. Connections still
    /// waiting in the backlog are torn down. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let port = self.handle.listen_endpoint.port();
        LISTENERS.remove_if(&port, |_, handle| Arc::ptr_eq(handle, &self.handle));
        drop(self.handle.backlog.lock().take());
        self.shutdown.cancel();

        // A pending accept may still hold the backlog; it drains it once it
        // observes the shutdown.
        if let Ok(mut backlog) = self.incoming.try_lock() {
            backlog.close_and_drain();
        }

        mock_quic::active_listeners().dec();
        log::debug!("mock listener disposed";
            "listen_addr" => self.handle.listen_endpoint);
    }
}

impl Drop for MockListener {
    fn drop(&mut self) {
        self.dispose();
    }
}
