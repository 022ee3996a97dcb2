//! Wire codec and monotonic clock (component A).
//!
//! Fixed-endian integer encode/decode for the field widths DTLS records and
//! handshake fragments use (`uint16`, `uint24`, `uint48`), plus a monotonic
//! millisecond clock for the retransmission timers in [`crate::flight`].
//!
//! These functions take caller-supplied buffers at caller-supplied offsets.
//! A buffer too small for the write/read is a programming error: it panics
//! via ordinary slice indexing rather than returning a `Result`, exactly as
//! the DTLS core this is modeled on treats it (§4.1).

use std::sync::OnceLock;
use std::time::Instant;

/// Write a `u16` to `buf[offset..offset + 2]` in network byte order.
pub fn write_uint16(value: u16, buf: &mut [u8], offset: usize) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

/// Read a `u16` from `buf[offset..offset + 2]` in network byte order.
pub fn read_uint16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes(buf[offset..offset + 2].try_into().unwrap())
}

/// Write the low 24 bits of `value` to `buf[offset..offset + 3]` in network byte order.
pub fn write_uint24(value: u32, buf: &mut [u8], offset: usize) {
    let bytes = value.to_be_bytes();
    buf[offset..offset + 3].copy_from_slice(&bytes[1..4]);
}

/// Read a 24-bit unsigned integer from `buf[offset..offset + 3]`.
pub fn read_uint24(buf: &[u8], offset: usize) -> u32 {
    let b = &buf[offset..offset + 3];
    u32::from_be_bytes([0, b[0], b[1], b[2]])
}

/// Write the low 48 bits of `value` to `buf[offset..offset + 6]` in network byte order.
pub fn write_uint48(value: u64, buf: &mut [u8], offset: usize) {
    let bytes = value.to_be_bytes();
    buf[offset..offset + 6].copy_from_slice(&bytes[2..8]);
}

/// Read a 48-bit unsigned integer from `buf[offset..offset + 6]`.
pub fn read_uint48(buf: &[u8], offset: usize) -> u64 {
    let b = &buf[offset..offset + 6];
    u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]])
}

fn clock_origin() -> Instant {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    *ORIGIN.get_or_init(Instant::now)
}

/// Milliseconds elapsed on a monotonic clock since the process first called
/// this function. Not wall-clock time; only differences between two calls
/// to `now_ms` are meaningful.
pub fn now_ms() -> u64 {
    clock_origin().elapsed().as_millis() as u64
}

/// `later - earlier` in milliseconds, clamped to zero if `later < earlier`.
pub fn delta_ms(later: u64, earlier: u64) -> u64 {
    later.saturating_sub(earlier)
}
