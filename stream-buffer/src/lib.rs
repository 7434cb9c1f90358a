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

//! An in-memory byte pipe with one producer side and one consumer side.
//!
//! [`StreamBuffer`] is the data path underneath every mock QUIC stream: the
//! sending half of a stream writes into it, the receiving half reads from it.
//! Both halves can wait asynchronously, or block the current thread through
//! the `*_blocking` variants. The buffer never fails; terminal conditions are
//! reported as zero-length reads.

use std::collections::VecDeque;
use std::pin::pin;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default number of bytes a [`StreamBuffer`] holds before writers have to
/// wait for the reader.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 32 * 1024;

/// A bounded, FIFO byte pipe.
///
/// Writers suspend while the buffer holds `max_buffer_size` bytes. Once the
/// writer calls [`end_write`](Self::end_write), readers drain the remaining
/// bytes and then observe end-of-stream. Once the reader calls
/// [`abort_read`](Self::abort_read), buffered bytes are dropped and any
/// further written data is discarded.
#[derive(Debug)]
pub struct StreamBuffer {
    state: Mutex<BufferState>,
    /// Woken whenever bytes arrive or the buffer reaches a terminal state.
    readable: Notify,
    /// Woken whenever room frees up or the buffer reaches a terminal state.
    writable: Notify,
    max_buffer_size: usize,
}

#[derive(Debug, Default)]
struct BufferState {
    bytes: VecDeque<u8>,
    write_ended: bool,
    read_aborted: bool,
}

impl BufferState {
    /// Copies buffered bytes into `buf`. Returns `None` if the reader has to
    /// wait for more data.
    fn try_read(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.read_aborted {
            return Some(0);
        }

        if !self.bytes.is_empty() {
            let n = buf.len().min(self.bytes.len());
            for (dst, src) in buf.iter_mut().zip(self.bytes.drain(..n)) {
                *dst = src;
            }
            return Some(n);
        }

        self.write_ended.then_some(0)
    }

    fn discards_writes(&self) -> bool {
        self.read_aborted || self.write_ended
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_SIZE)
    }
}

impl StreamBuffer {
    /// Creates an empty buffer. A `max_buffer_size` of zero is treated as one
    /// byte so writers can always make progress.
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            readable: Notify::new(),
            writable: Notify::new(),
            max_buffer_size: max_buffer_size.max(1),
        }
    }

    /// The configured capacity of the buffer.
    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Number of bytes currently waiting to be read.
    pub fn len(&self) -> usize {
        self.state.lock().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the writer signalled that no more data will follow.
    pub fn is_write_ended(&self) -> bool {
        self.state.lock().write_ended
    }

    /// Whether the reader refused any further input.
    pub fn is_read_aborted(&self) -> bool {
        self.state.lock().read_aborted
    }

    /// Reads up to `buf.len()` bytes, waiting until at least one byte is
    /// available.
    ///
    /// Returns `0` once the writer ended the stream and all bytes have been
    /// consumed, after [`abort_read`](Self::abort_read), or if `buf` is empty.
    pub async fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }

        loop {
            let mut readable = pin!(self.readable.notified());

            {
                let mut state = self.state.lock();
                if let Some(n) = state.try_read(buf) {
                    drop(state);
                    if n > 0 {
                        self.writable.notify_waiters();
                    }
                    return n;
                }

                // Register before releasing the lock so a concurrent write
                // can't slip in between the check and the wait.
                readable.as_mut().enable();
            }

            readable.await;
        }
    }

    /// Writes all of `data`, waiting for the reader whenever the buffer is
    /// full.
    ///
    /// If the reader aborted or the stream was ended, the remaining data is
    /// discarded and the call returns immediately.
    pub async fn write(&self, mut data: &[u8]) {
        while !data.is_empty() {
            let mut writable = pin!(self.writable.notified());

            {
                let mut state = self.state.lock();
                if state.discards_writes() {
                    return;
                }

                let room = self.max_buffer_size.saturating_sub(state.bytes.len());
                if room > 0 {
                    let n = room.min(data.len());
                    state.bytes.extend(&data[..n]);
                    data = &data[n..];
                    drop(state);

                    self.readable.notify_waiters();
                    continue;
                }

                writable.as_mut().enable();
            }

            writable.await;
        }
    }

    /// Blocking version of [`read`](Self::read).
    ///
    /// This parks the current thread. Do not call it from an async context.
    pub fn read_blocking(&self, buf: &mut [u8]) -> usize {
        futures::executor::block_on(self.read(buf))
    }

    /// Blocking version of [`write`](Self::write).
    ///
    /// This parks the current thread. Do not call it from an async context.
    pub fn write_blocking(&self, data: &[u8]) {
        futures::executor::block_on(self.write(data))
    }

    /// Signals that the writer is done. Buffered bytes stay readable.
    pub fn end_write(&self) {
        self.state.lock().write_ended = true;
        self.wake_all();
    }

    /// Signals that the reader refuses further input. Buffered bytes are
    /// dropped and pending writers are released.
    pub fn abort_read(&self) {
        {
            let mut state = self.state.lock();
            state.read_aborted = true;
            state.bytes.clear();
        }
        self.wake_all();
    }

    fn wake_all(&self) {
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}
