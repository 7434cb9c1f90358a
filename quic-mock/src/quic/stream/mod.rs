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

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use foundations::telemetry::log;

use self::state::AbortReason;
use self::state::StreamDirection;
pub(crate) use self::state::StreamState;

use super::connection::ConnectionState;
use super::QuicError;
use super::Role;
use super::StreamKind;
use crate::QuicResult;

/// One end of a stream.
///
/// The initiator writes what the acceptor reads and vice versa; a
/// unidirectional stream can only be written by its initiator. Errors set by
/// the peer are picked up on the next operation, or when a pending read or
/// write wakes up. A connection-level error always wins over a stream-level
/// one.
///
/// Dropping the handle shuts the stream down.
#[derive(Debug)]
pub struct MockStream {
    connection: Arc<ConnectionState>,
    stream: Arc<StreamState>,
    role: Role,
    writes_cancelled: AtomicBool,
    shut_down: AtomicBool,
    disposed: AtomicBool,
}

impl MockStream {
    pub(crate) fn new(
        connection: Arc<ConnectionState>, stream: Arc<StreamState>, role: Role,
    ) -> Self {
        Self {
            connection,
            stream,
            role,
            writes_cancelled: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.stream.id()
    }

    #[inline]
    pub fn kind(&self) -> StreamKind {
        self.stream.kind()
    }

    /// Whether this end opened the stream.
    #[inline]
    pub fn is_initiator(&self) -> bool {
        self.stream.initiator() == self.role
    }

    pub fn can_read(&self) -> bool {
        self.recv_direction().is_some()
    }

    pub fn can_write(&self) -> bool {
        self.send_direction().is_some()
    }

    fn send_direction(&self) -> Option<&StreamDirection> {
        self.stream.send_direction(self.is_initiator())
    }

    fn recv_direction(&self) -> Option<&StreamDirection> {
        self.stream.recv_direction(self.is_initiator())
    }

    fn check_disposed(&self) -> QuicResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(QuicError::Disposed);
        }
        Ok(())
    }

    /// The error the peer's connection teardown left behind, if any.
    fn connection_error(&self) -> Option<QuicError> {
        self.connection
            .error_code(self.role.peer())
            .map(|error_code| QuicError::ConnectionAborted { error_code })
    }

    /// Reads up to `buf.len()` bytes.
    ///
    /// Returns `Ok(0)` once the peer finished its side of the stream and all
    /// data was consumed. If the stream ended because of an abort instead,
    /// the abort is reported as an error.
    pub async fn read(&self, buf: &mut [u8]) -> QuicResult<usize> {
        self.check_disposed()?;
        let direction = self
            .recv_direction()
            .ok_or(QuicError::NotSupported("stream is not readable"))?;

        if buf.is_empty() {
            return Ok(0);
        }

        let n = direction.buffer.read(buf).await;
        if n > 0 {
            return Ok(n);
        }

        if let Some(err) = self.connection_error() {
            return Err(err);
        }
        if let Some(reason) = direction.read_error.get() {
            return Err((*reason).into());
        }

        Ok(0)
    }

    /// Writes all of `buf`. Equivalent to `write_with_fin(buf, false)`.
    pub async fn write(&self, buf: &[u8]) -> QuicResult<()> {
        self.write_with_fin(buf, false).await
    }

    /// Writes all of `buf`, and finishes this side of the stream afterwards
    /// if `end_stream` is set.
    ///
    /// Waits while the peer's receive buffer is full. Dropping the returned
    /// future before it completes cancels this and every later write on the
    /// stream with [`QuicError::Cancelled`].
    pub async fn write_with_fin(
        &self, buf: &[u8], end_stream: bool,
    ) -> QuicResult<()> {
        self.check_disposed()?;
        if self.writes_cancelled.load(Ordering::Acquire) {
            return Err(QuicError::Cancelled);
        }

        let direction = self
            .send_direction()
            .ok_or(QuicError::NotSupported("stream is not writable"))?;

        self.check_write_errors(direction)?;
        if direction.buffer.is_write_ended() {
            return Err(QuicError::StreamFinished);
        }

        let mut guard = CancelOnDrop::new(&self.writes_cancelled);
        direction.buffer.write(buf).await;
        guard.disarm();

        // The peer may have aborted while we were waiting for room.
        self.check_write_errors(direction)?;

        if end_stream {
            direction.buffer.end_write();
            direction.writes_completed.complete(Ok(()));
        }

        Ok(())
    }

    fn check_write_errors(&self, direction: &StreamDirection) -> QuicResult<()> {
        if let Some(err) = self.connection_error() {
            return Err(err);
        }
        if let Some(reason) = direction.write_error.get() {
            return Err((*reason).into());
        }
        Ok(())
    }

    /// Stops reading and tells the peer's writer to stop with `error_code`.
    ///
    /// Buffered data is dropped. Pending and later writes of the peer fail
    /// with [`QuicError::StreamAborted`], later reads on this end with
    /// [`QuicError::OperationAborted`]. No-op on a stream this end can't read.
    pub fn abort_read(&self, error_code: u64) {
        let Some(direction) = self.recv_direction() else {
            return;
        };

        log::trace!("aborting stream read";
            "stream_id" => self.id(), "role" => self.role.as_str(), "error_code" => error_code);

        let _ = direction.write_error.set(AbortReason::Code(error_code));
        let _ = direction.read_error.set(AbortReason::OperationAborted);
        direction
            .writes_completed
            .complete(Err(QuicError::StreamAborted { error_code }));
        direction.buffer.abort_read();
    }

    /// Stops writing and tells the peer's reader that no more data follows.
    ///
    /// Data already buffered stays readable; once it is consumed, the peer's
    /// reads fail with [`QuicError::StreamAborted`]. Later writes on this end
    /// fail with [`QuicError::OperationAborted`]. No-op on a stream this end
    /// can't write.
    pub fn abort_write(&self, error_code: u64) {
        let Some(direction) = self.send_direction() else {
            return;
        };

        log::trace!("aborting stream write";
            "stream_id" => self.id(), "role" => self.role.as_str(), "error_code" => error_code);

        let _ = direction.read_error.set(AbortReason::Code(error_code));
        let _ = direction.write_error.set(AbortReason::OperationAborted);
        direction
            .writes_completed
            .complete(Err(QuicError::StreamAborted { error_code }));
        direction.buffer.end_write();
    }

    /// Gracefully finishes this end of the stream. On the accepting end this
    /// also returns the stream's slot to the budget it was admitted against;
    /// the initiator can't free its peer's budget on its own.
    ///
    /// Only the first call has an effect.
    pub fn shutdown(&self) -> QuicResult<()> {
        self.check_disposed()?;
        self.shutdown_inner();
        Ok(())
    }

    fn shutdown_inner(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(direction) = self.send_direction() {
            direction.buffer.end_write();
            direction.writes_completed.complete(Ok(()));
        }

        if !self.is_initiator() {
            self.connection.release_admission(&self.stream);
        }

        log::trace!("stream shut down";
            "stream_id" => self.id(), "role" => self.role.as_str());
    }

    /// Waits until this end's writes are complete, either because this end
    /// finished or because the stream was aborted.
    pub async fn wait_for_write_completion(&self) -> QuicResult<()> {
        let direction = self
            .send_direction()
            .ok_or(QuicError::NotSupported("stream is not writable"))?;

        direction.writes_completed.wait().await
    }

    /// Shuts the stream down if that hasn't happened yet, and invalidates the
    /// handle. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown_inner();
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Marks the stream's writes as cancelled unless disarmed before it drops.
struct CancelOnDrop<'a> {
    writes_cancelled: &'a AtomicBool,
    armed: bool,
}

impl<'a> CancelOnDrop<'a> {
    fn new(writes_cancelled: &'a AtomicBool) -> Self {
        Self {
            writes_cancelled,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.writes_cancelled.store(true, Ordering::Release);
        }
    }
}

/// Blocking reads. Parks the current thread; don't use from async code.
impl io::Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        futures::executor::block_on(MockStream::read(self, buf)).map_err(Into::into)
    }
}

/// Blocking writes. Parks the current thread; don't use from async code.
impl io::Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        futures::executor::block_on(MockStream::write(self, buf))
            .map(|()| buf.len())
            .map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
