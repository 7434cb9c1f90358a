use std::io;

use crate::quic::QuicError;

/// [Result] alias based on [`QuicError`] for this crate.
///
/// The mock transport distinguishes admission failures, refused connections
/// and the different abort flavours, and callers routinely match on them, so
/// unlike most of our networking crates this one uses a concrete error type.
pub type QuicResult<T> = Result<T, QuicError>;

/// Extension trait to add methods to [Result].
pub trait QuicResultExt<T> {
    /// Turns the [Result] into an [`io::Result`], keeping the closest
    /// [`io::ErrorKind`] for each [`QuicError`].
    fn into_io(self) -> io::Result<T>;
}

impl<T> QuicResultExt<T> for QuicResult<T> {
    #[inline]
    fn into_io(self) -> io::Result<T> {
        self.map_err(io::Error::from)
    }
}
