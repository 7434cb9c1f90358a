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

use std::sync::Arc;

use parking_lot::Mutex;

use super::signal::CompletionSignal;
use super::QuicError;
use super::StreamKind;
use crate::QuicResult;

/// Admission control for one kind of stream.
///
/// Counts how many streams of one [`StreamKind`] are currently held against a
/// peer's budget. Opening a stream calls [`try_increment`](Self::try_increment),
/// the acceptor shutting it down calls [`decrement`](Self::decrement).
#[derive(Debug)]
pub struct StreamLimit {
    max_count: u64,
    inner: Mutex<LimitState>,
}

#[derive(Debug)]
struct LimitState {
    // Invariant: actual_count <= max_count
    actual_count: u64,
    availability: Availability,
}

/// Where waiters park until budget frees up.
///
/// Each `Pending` signal fires at most once. `decrement` swaps in a fresh one
/// under the same lock that waiters take to pick up the current signal, so a
/// waiter either sees the freed budget directly or parks on a signal that is
/// still going to fire.
#[derive(Debug)]
enum Availability {
    Pending(Arc<CompletionSignal>),
    Closed,
}

impl StreamLimit {
    pub(crate) fn new(max_count: u64) -> Self {
        Self {
            max_count,
            inner: Mutex::new(LimitState {
                actual_count: 0,
                availability: Availability::Pending(Default::default()),
            }),
        }
    }

    /// The configured capacity.
    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    /// How many more streams can be opened right now.
    pub fn available_count(&self) -> u64 {
        self.max_count - self.inner.lock().actual_count
    }

    /// Takes one unit of budget. Returns `false`, without side effects, when
    /// the budget is exhausted.
    pub(crate) fn try_increment(&self) -> bool {
        let mut state = self.inner.lock();
        if state.actual_count < self.max_count {
            state.actual_count += 1;
            return true;
        }

        false
    }

    /// Returns one unit of budget and wakes everyone waiting for it.
    pub(crate) fn decrement(&self) {
        let mut state = self.inner.lock();
        state.actual_count = state.actual_count.saturating_sub(1);

        if let Availability::Pending(signal) = &mut state.availability {
            let fired = std::mem::take(signal);
            fired.complete(Ok(()));
        }
    }

    /// Waits until at least one unit of budget is available.
    ///
    /// Resolves immediately if budget is available already. Fails with
    /// [`QuicError::OperationAborted`] once [`close_waiters`] was called.
    ///
    /// [`close_waiters`]: Self::close_waiters
    pub(crate) async fn wait_for_available_streams(&self) -> QuicResult<()> {
        loop {
            let signal = {
                let state = self.inner.lock();
                let signal = match &state.availability {
                    Availability::Pending(signal) => Arc::clone(signal),
                    Availability::Closed => return Err(QuicError::OperationAborted),
                };

                if state.actual_count < self.max_count {
                    return Ok(());
                }

                signal
            };

            signal.wait().await?;
        }
    }

    /// Fails all current and future waiters. The limit keeps counting, but
    /// nobody can wait on it anymore.
    pub(crate) fn close_waiters(&self) {
        let mut state = self.inner.lock();
        let previous =
            std::mem::replace(&mut state.availability, Availability::Closed);

        if let Availability::Pending(signal) = previous {
            signal.complete(Err(QuicError::OperationAborted));
        }
    }
}

/// One side's stream budget, as seen by its peer.
#[derive(Debug)]
pub struct PeerStreamLimit {
    pub unidirectional: StreamLimit,
    pub bidirectional: StreamLimit,
}

impl PeerStreamLimit {
    pub(crate) fn new(max_unidirectional: u64, max_bidirectional: u64) -> Self {
        Self {
            unidirectional: StreamLimit::new(max_unidirectional),
            bidirectional: StreamLimit::new(max_bidirectional),
        }
    }

    pub(crate) fn for_kind(&self, kind: StreamKind) -> &StreamLimit {
        match kind {
            StreamKind::Unidirectional => &self.unidirectional,
            StreamKind::Bidirectional => &self.bidirectional,
        }
    }

    pub(crate) fn close_waiters(&self) {
        self.unidirectional.close_waiters();
        self.bidirectional.close_waiters();
    }
}
