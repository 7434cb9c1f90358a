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
use tokio::sync::mpsc;

use super::stream::StreamState;

/// FIFO of opened-but-not-yet-accepted streams for one initiation direction.
///
/// Unbounded: admission is enforced by the stream limits, not by the queue.
#[derive(Debug)]
pub(crate) struct StreamQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<Arc<StreamState>>>>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<StreamState>>>,
}

impl Default for StreamQueue {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }
}

impl StreamQueue {
    /// Enqueues a stream. Hands it back if the queue was closed.
    pub(crate) fn push(
        &self, stream: Arc<StreamState>,
    ) -> Result<(), Arc<StreamState>> {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(stream).map_err(|err| err.0),
            None => Err(stream),
        }
    }

    /// Dequeues the oldest stream, waiting for one if necessary. Returns
    /// `None` once the queue is closed and empty.
    ///
    /// A pop that is already waiting when the queue closes may still be
    /// handed a stream the drain couldn't reach; callers check for a closed
    /// connection afterwards.
    pub(crate) async fn pop(&self) -> Option<Arc<StreamState>> {
        self.rx.lock().await.recv().await
    }

    /// Closes the queue for good and returns the streams nobody accepted.
    pub(crate) fn close_and_drain(&self) -> Vec<Arc<StreamState>> {
        // Dropping the only sender ends pending and later pops.
        drop(self.tx.lock().take());

        let Ok(mut rx) = self.rx.try_lock() else {
            return Vec::new();
        };

        rx.close();
        let mut drained = Vec::new();
        while let Ok(stream) = rx.try_recv() {
            drained.push(stream);
        }
        drained
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rx.try_lock().map(|rx| rx.len()).unwrap_or_default()
    }
}
