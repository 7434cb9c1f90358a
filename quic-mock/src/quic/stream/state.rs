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

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::OnceLock;

use stream_buffer::StreamBuffer;

use super::super::signal::CompletionSignal;
use super::super::QuicError;
use super::super::Role;
use super::super::StreamKind;

/// Why one half of a stream stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AbortReason {
    /// Aborted locally or by a connection teardown without an error code.
    OperationAborted,
    /// Aborted by the peer with an application error code.
    Code(u64),
}

impl From<AbortReason> for QuicError {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::OperationAborted => QuicError::OperationAborted,
            AbortReason::Code(error_code) => QuicError::StreamAborted { error_code },
        }
    }
}

/// One direction of a stream: the bytes in flight plus the error slots of its
/// writer and its reader.
#[derive(Debug)]
pub(crate) struct StreamDirection {
    pub(crate) buffer: StreamBuffer,
    /// Reported to the reader once the buffer runs dry. Set by the writer's
    /// `abort_write` or by a teardown.
    pub(crate) read_error: OnceLock<AbortReason>,
    /// Reported to the writer on its next write. Set by the reader's
    /// `abort_read` or by a teardown.
    pub(crate) write_error: OnceLock<AbortReason>,
    /// Fired once the writer finished, gracefully or not.
    pub(crate) writes_completed: CompletionSignal,
}

impl StreamDirection {
    fn new(max_buffer_size: usize) -> Self {
        Self {
            buffer: StreamBuffer::new(max_buffer_size),
            read_error: OnceLock::new(),
            write_error: OnceLock::new(),
            writes_completed: CompletionSignal::default(),
        }
    }

    /// Marks both halves as aborted unless they already carry an error, and
    /// wakes anyone blocked on the buffer.
    ///
    /// Buffered bytes stay readable unless `discard` is set. A direction the
    /// writer already finished keeps its graceful end for the reader, unless
    /// its bytes are discarded.
    fn terminate(&self, failure: &QuicError, discard: bool) {
        if discard || !self.buffer.is_write_ended() {
            let _ = self.read_error.set(AbortReason::OperationAborted);
        }
        let _ = self.write_error.set(AbortReason::OperationAborted);
        self.writes_completed.complete(Err(failure.clone()));

        self.buffer.end_write();
        if discard {
            self.buffer.abort_read();
        }
    }
}

/// The state of one stream, shared by its initiator and its acceptor.
#[derive(Debug)]
pub(crate) struct StreamState {
    id: u64,
    kind: StreamKind,
    initiator: Role,
    /// Bytes sent by the initiator.
    outbound: StreamDirection,
    /// Bytes sent by the acceptor. Unidirectional streams don't have one.
    inbound: Option<StreamDirection>,
    admission_released: AtomicBool,
}

impl StreamState {
    pub(crate) fn new(
        id: u64, kind: StreamKind, initiator: Role, max_buffer_size: usize,
    ) -> Self {
        let inbound = match kind {
            StreamKind::Bidirectional =>
                Some(StreamDirection::new(max_buffer_size)),
            StreamKind::Unidirectional => None,
        };

        Self {
            id,
            kind,
            initiator,
            outbound: StreamDirection::new(max_buffer_size),
            inbound,
            admission_released: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn kind(&self) -> StreamKind {
        self.kind
    }

    pub(crate) fn initiator(&self) -> Role {
        self.initiator
    }

    /// The direction the given side writes to.
    pub(crate) fn send_direction(&self, is_initiator: bool) -> Option<&StreamDirection> {
        if is_initiator {
            Some(&self.outbound)
        } else {
            self.inbound.as_ref()
        }
    }

    /// The direction the given side reads from.
    pub(crate) fn recv_direction(&self, is_initiator: bool) -> Option<&StreamDirection> {
        if is_initiator {
            self.inbound.as_ref()
        } else {
            Some(&self.outbound)
        }
    }

    fn directions(&self) -> impl Iterator<Item = &StreamDirection> {
        std::iter::once(&self.outbound).chain(self.inbound.as_ref())
    }

    /// Claims the right to return this stream's admission slot. Only the
    /// first caller gets `true`.
    pub(crate) fn take_admission(&self) -> bool {
        !self.admission_released.swap(true, Ordering::AcqRel)
    }

    /// Tears the stream down as part of a connection teardown. Both
    /// completion signals fail with `failure`; blocked readers and writers
    /// wake up and pick their error from the connection and stream state.
    pub(crate) fn terminate(&self, failure: &QuicError) {
        for direction in self.directions() {
            direction.terminate(failure, false);
        }
    }

    /// Like [`terminate`](Self::terminate), for streams that were never
    /// accepted. Nobody will ever read their buffers, so the bytes are
    /// dropped as well.
    pub(crate) fn abandon(&self, failure: &QuicError) {
        for direction in self.directions() {
            direction.terminate(failure, true);
        }
    }
}
