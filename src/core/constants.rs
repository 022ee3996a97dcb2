//! Protocol constants for the DTLS reliability and anti-replay core.
//!
//! These values are fixed by the DTLS specification and MUST NOT be changed.

// =============================================================================
// RECORD / HANDSHAKE WIRE SIZES
// =============================================================================

/// DTLS plaintext record header size: type(1) + version(2) + epoch(2) + sequence(6) + length(2).
pub const DTLS_RECORD_HEADER_SIZE: usize = 13;

/// DTLS handshake fragment header size: msg_type(1) + total_length(3) + message_seq(2)
/// + fragment_offset(3) + fragment_length(3).
pub const DTLS_HANDSHAKE_HEADER_SIZE: usize = 12;

/// DTLS protocol version on the wire, `{254, 255}`.
pub const DTLS_VERSION: [u8; 2] = [254, 255];

// =============================================================================
// ANTI-REPLAY WINDOW
// =============================================================================

/// Number of 48-bit sequence slots retained by the per-epoch replay window.
pub const DTLS_RECORD_WINDOW_SIZE: usize = 64;

/// Batch size used when the window rotates to make room for new sequences.
pub const MOVE_SIZE: usize = 20;

// =============================================================================
// RETRANSMISSION TIMERS
// =============================================================================

/// Ceiling on the retransmission backoff timer, in milliseconds.
///
/// `actual_retrans_timeout_ms` is reduced modulo this value on every
/// retransmit, so the timer never exceeds it.
pub const MAX_DTLS_TIMEOUT: u64 = 60_000;

// =============================================================================
// COOKIE ENGINE
// =============================================================================

/// Cookie length on the wire, and the truncated HMAC-SHA1 MAC length.
pub const COOKIE_SIZE: usize = 16;

/// Full HMAC-SHA1 digest size before truncation to `COOKIE_SIZE`.
pub const COOKIE_HASH_SIZE: usize = 20;

/// DTLS handshake type: ClientHello.
pub const HANDSHAKE_CLIENT_HELLO: u8 = 1;

/// DTLS handshake type: HelloVerifyRequest.
pub const HANDSHAKE_HELLO_VERIFY_REQUEST: u8 = 3;

/// DTLS handshake type: Finished. Flights carrying this type are terminal.
pub const HANDSHAKE_FINISHED: u8 = 20;

/// Content type: handshake record.
pub const CONTENT_TYPE_HANDSHAKE: u8 = 22;

/// Content type: ChangeCipherSpec record.
pub const CONTENT_TYPE_CHANGE_CIPHER_SPEC: u8 = 20;

/// Offset of the ClientHello cookie field relative to the start of the
/// handshake body: version(2) + random(32).
pub const CLIENT_HELLO_RANDOM_END: usize = 34;

/// Maximum accepted DTLS session-id length (RFC 6347 caps it at 32 bytes).
pub const MAX_SESSION_ID_SIZE: u8 = 32;
