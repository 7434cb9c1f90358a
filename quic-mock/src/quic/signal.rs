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

use tokio::sync::watch;

use super::QuicError;
use crate::QuicResult;

/// A single-assignment completion signal.
///
/// The first call to [`complete`](Self::complete) decides the outcome; every
/// waiter, including ones that arrive afterwards, observes that outcome.
#[derive(Debug)]
pub(crate) struct CompletionSignal {
    outcome: watch::Sender<Option<QuicResult<()>>>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        // `send_if_modified` works without receivers, so the initial one is
        // dropped right away. Waiters subscribe on demand.
        let (outcome, _) = watch::channel(None);
        Self { outcome }
    }
}

impl CompletionSignal {
    /// Fulfils the signal. Returns `false` if it was already completed, in
    /// which case `outcome` is dropped.
    pub(crate) fn complete(&self, outcome: QuicResult<()>) -> bool {
        self.outcome.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(outcome);
            true
        })
    }

    #[cfg(test)]
    pub(crate) fn is_completed(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Waits until the signal completes and returns its outcome.
    pub(crate) async fn wait(&self) -> QuicResult<()> {
        let mut rx = self.outcome.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| QuicError::OperationAborted)?;

        let outcome: Option<QuicResult<()>> = (*outcome).clone();
        outcome.unwrap_or(Err(QuicError::OperationAborted))
    }
}
