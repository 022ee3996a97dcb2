//! Error types for the DTLS reliability core.

use thiserror::Error;

/// Errors from the cookie engine (§4.3).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CookieError {
    /// Caller supplied a zero-length key.
    #[error("invalid request: cookie key must be non-empty")]
    InvalidKey,

    /// The incoming packet was too short to contain the fields this core reads.
    #[error("unexpected packet length")]
    UnexpectedPacketLength,

    /// The cookie field was the wrong length, or its MAC did not match.
    #[error("bad cookie")]
    BadCookie,
}

/// Errors from the flight transmitter (§4.4).
#[derive(Debug, Error)]
pub enum FlightError {
    /// The global handshake timeout elapsed before the peer's reply flight arrived.
    #[error("handshake timed out")]
    TimedOut,

    /// Non-blocking mode: no progress is possible right now, call `transmit` again.
    #[error("would block")]
    Again,

    /// The transport's push/pull callbacks returned an I/O error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level errors for the DTLS core.
#[derive(Debug, Error)]
pub enum DtlsError {
    /// Cookie engine error.
    #[error("cookie error: {0}")]
    Cookie(#[from] CookieError),

    /// Flight transmitter error.
    #[error("flight error: {0}")]
    Flight(#[from] FlightError),

    /// Caller violated an API precondition not specific to cookies or flights.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
