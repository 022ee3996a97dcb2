//! Stateless cookie exchange, a.k.a. HelloVerifyRequest (component C, §4.3).
//!
//! The server answers an initial ClientHello with a MAC-bound cookie and
//! refuses to allocate per-connection state until the client echoes it.
//! Two servers sharing a key are interchangeable across packets: nothing
//! here is per-client state, it's all recomputed from `key` and
//! `client_identity` on every call.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::core::{
    CookieError, CLIENT_HELLO_RANDOM_END, CONTENT_TYPE_HANDSHAKE, COOKIE_SIZE,
    DTLS_HANDSHAKE_HEADER_SIZE, DTLS_RECORD_HEADER_SIZE, DTLS_VERSION,
    HANDSHAKE_HELLO_VERIFY_REQUEST, MAX_SESSION_ID_SIZE,
};
use crate::wire::{write_uint16, write_uint24};

type HmacSha1 = Hmac<Sha1>;

/// Cookie hand-off record, bridging a verified cookie to a freshly allocated
/// session (§4.4, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prestate {
    /// The client's observed record sequence number (low byte only).
    pub record_seq: u8,
    /// The client's handshake read sequence (low byte only).
    pub hsk_read_seq: u8,
    /// The handshake sequence the server used when sending this cookie.
    pub hsk_write_seq: u8,
}

fn cookie_mac(key: &[u8], client_identity: &[u8]) -> Result<[u8; COOKIE_SIZE], CookieError> {
    if key.is_empty() {
        return Err(CookieError::InvalidKey);
    }
    let mut mac = HmacSha1::new_from_slice(key).map_err(|_| CookieError::InvalidKey)?;
    mac.update(client_identity);
    let digest = mac.finalize().into_bytes();
    let mut cookie = [0u8; COOKIE_SIZE];
    cookie.copy_from_slice(&digest[..COOKIE_SIZE]);
    Ok(cookie)
}

/// Build the full HelloVerifyRequest datagram: DTLS record header, handshake
/// fragment header, and the `{version, cookie_len, cookie}` body (§6).
fn build_hello_verify_request(
    key: &[u8],
    client_identity: &[u8],
    prestate: &Prestate,
) -> Result<[u8; DTLS_RECORD_HEADER_SIZE + DTLS_HANDSHAKE_HEADER_SIZE + 2 + 1 + COOKIE_SIZE],
     CookieError>
{
    const BODY_LEN: usize = 2 + 1 + COOKIE_SIZE; // version + cookie_len + cookie
    const HS_LEN: usize = DTLS_HANDSHAKE_HEADER_SIZE + BODY_LEN;
    const TOTAL: usize = DTLS_RECORD_HEADER_SIZE + HS_LEN;

    let cookie = cookie_mac(key, client_identity)?;
    let mut buf = [0u8; TOTAL];

    // --- DTLS record header ---
    buf[0] = CONTENT_TYPE_HANDSHAKE;
    buf[1..3].copy_from_slice(&DTLS_VERSION);
    // epoch = 0 (bytes 3..5 already zero)
    // record sequence: zero except the low byte, which carries the client's
    // observed record seq so retransmitted ClientHellos get identical cookies.
    buf[10] = prestate.record_seq;
    write_uint16(HS_LEN as u16, &mut buf, 11);

    // --- handshake fragment header ---
    let hs = DTLS_RECORD_HEADER_SIZE;
    buf[hs] = HANDSHAKE_HELLO_VERIFY_REQUEST;
    write_uint24(BODY_LEN as u32, &mut buf, hs + 1);
    write_uint16(prestate.hsk_write_seq as u16, &mut buf, hs + 4);
    write_uint24(0, &mut buf, hs + 6); // fragment_offset
    write_uint24(BODY_LEN as u32, &mut buf, hs + 9); // fragment_length

    // --- HelloVerifyRequest body ---
    let body = hs + DTLS_HANDSHAKE_HEADER_SIZE;
    buf[body..body + 2].copy_from_slice(&DTLS_VERSION);
    buf[body + 2] = COOKIE_SIZE as u8;
    buf[body + 3..body + 3 + COOKIE_SIZE].copy_from_slice(&cookie);

    Ok(buf)
}

/// Build a HelloVerifyRequest datagram and hand it to `push`.
///
/// `push` plays the role of the spec's `transport_push` callback (§4.3); it
/// returns the number of bytes accepted, or an I/O error which is reported
/// to the caller as-is (the spec's `PushError`).
pub fn cookie_send(
    key: &[u8],
    client_identity: &[u8],
    prestate: &Prestate,
    push: impl FnOnce(&[u8]) -> std::io::Result<usize>,
) -> Result<usize, CookieSendError> {
    let datagram = build_hello_verify_request(key, client_identity, prestate)?;
    push(&datagram).map_err(CookieSendError::Push)
}

/// Errors from [`cookie_send`]: either the cookie engine rejected the
/// request, or the transport's push callback failed.
#[derive(Debug, thiserror::Error)]
pub enum CookieSendError {
    /// Cookie construction failed (bad key).
    #[error(transparent)]
    Cookie(#[from] CookieError),
    /// The transport push callback returned an error.
    #[error("push error: {0}")]
    Push(#[source] std::io::Error),
}

/// Verify an incoming (second) ClientHello's cookie field.
///
/// `incoming_msg` is the full datagram: DTLS record header, DTLS handshake
/// fragment header, then the ClientHello body starting with
/// `version(2) | random(32) | session_id<0..32> | cookie<0..32>`.
pub fn cookie_verify(
    key: &[u8],
    client_identity: &[u8],
    incoming_msg: &[u8],
) -> Result<Prestate, CookieError> {
    if key.is_empty() {
        return Err(CookieError::InvalidKey);
    }

    let header_len = DTLS_RECORD_HEADER_SIZE + DTLS_HANDSHAKE_HEADER_SIZE;
    let mut pos = CLIENT_HELLO_RANDOM_END + header_len;

    if incoming_msg.len() < pos + 1 {
        return Err(CookieError::UnexpectedPacketLength);
    }
    let sid_size = incoming_msg[pos] as usize;
    pos += 1;

    if sid_size > MAX_SESSION_ID_SIZE as usize || incoming_msg.len() < pos + sid_size + 1 {
        return Err(CookieError::UnexpectedPacketLength);
    }
    pos += sid_size;

    let cookie_len = incoming_msg[pos] as usize;
    pos += 1;

    if incoming_msg.len() < pos + cookie_len + 1 {
        return Err(CookieError::UnexpectedPacketLength);
    }
    let cookie = &incoming_msg[pos..pos + cookie_len];

    if cookie_len != COOKIE_SIZE {
        return Err(CookieError::BadCookie);
    }

    let expected = cookie_mac(key, client_identity)?;
    if !constant_time_eq(&expected, cookie) {
        return Err(CookieError::BadCookie);
    }

    // Both indices fall before `pos`, which we've already validated as
    // in-bounds (pos >= CLIENT_HELLO_RANDOM_END + header_len > 18).
    let record_seq = incoming_msg[10];
    let hsk_read_seq = incoming_msg[DTLS_RECORD_HEADER_SIZE + 5];

    Ok(Prestate {
        record_seq,
        hsk_read_seq,
        hsk_write_seq: 0,
    })
}

/// Constant-time-equivalent byte comparison: accumulate the XOR of every
/// byte pair rather than short-circuiting on the first mismatch (§9).
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
