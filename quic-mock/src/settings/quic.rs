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

use foundations::settings::settings;

/// Mock QUIC configuration parameters.
///
/// These mirror the subset of QUIC transport parameters that the loopback
/// transport actually enforces.
#[settings]
#[non_exhaustive]
pub struct MockQuicSettings {
    /// Configures the list of supported application protocols. The first
    /// entry is the one both sides agree on.
    ///
    /// Defaults to `[b"h3"]`.
    #[serde(skip, default = "MockQuicSettings::default_alpn")]
    pub alpn: Vec<Vec<u8>>,

    /// The number of bidirectional streams the peer may have open at once.
    ///
    /// Defaults to `100`.
    #[serde(default = "MockQuicSettings::default_max_streams")]
    pub max_bidirectional_streams: u64,

    /// The number of unidirectional streams the peer may have open at once.
    ///
    /// Defaults to `100`.
    #[serde(default = "MockQuicSettings::default_max_streams")]
    pub max_unidirectional_streams: u64,

    /// The maximum number of connections queued on a listener until the
    /// application accepts them. Not applicable to client-side usage.
    ///
    /// Defaults to 1024 connections.
    #[serde(default = "MockQuicSettings::default_listen_backlog")]
    pub listen_backlog: usize,

    /// Number of bytes each direction of a stream buffers before the writer
    /// has to wait for the reader.
    ///
    /// Defaults to 32 KiB.
    #[serde(default = "MockQuicSettings::default_max_stream_buffer_size")]
    pub max_stream_buffer_size: usize,
}

impl MockQuicSettings {
    #[inline]
    fn default_alpn() -> Vec<Vec<u8>> {
        vec![b"h3".to_vec()]
    }

    #[inline]
    fn default_max_streams() -> u64 {
        100
    }

    #[inline]
    fn default_listen_backlog() -> usize {
        1024
    }

    #[inline]
    fn default_max_stream_buffer_size() -> usize {
        stream_buffer::DEFAULT_MAX_BUFFER_SIZE
    }
}
