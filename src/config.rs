//! Configuration surface for the flight transmitter (§10.4), built the way
//! the rest of this codebase's builders are: a `new()` with sane defaults,
//! chainable `with_*` setters, and a plain struct underneath.

/// Initial retransmission timeout, per RFC 6347 §4.2.4.1.
const DEFAULT_INITIAL_TIMEOUT_MS: u64 = 1_000;

/// Default overall handshake deadline.
const DEFAULT_TOTAL_TIMEOUT_MS: u64 = 60_000;

/// Default path MTU assumption when the transport doesn't report one.
const DEFAULT_MTU: usize = 1_200;

/// Tunable knobs for a [`crate::flight::FlightTransmitter`].
#[derive(Debug, Clone, Copy)]
pub struct DtlsConfig {
    mtu: usize,
    initial_timeout_ms: u64,
    total_timeout_ms: u64,
}

impl Default for DtlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DtlsConfig {
    /// Defaults: a conservative MTU, RFC 6347's 1-second initial timeout,
    /// and a 60-second handshake deadline.
    pub fn new() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            initial_timeout_ms: DEFAULT_INITIAL_TIMEOUT_MS,
            total_timeout_ms: DEFAULT_TOTAL_TIMEOUT_MS,
        }
    }

    /// Set the path MTU flights fragment to. Clamped to at least the size of
    /// one DTLS record and handshake header, since anything smaller can
    /// never carry a fragment.
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu.max(
            crate::core::DTLS_RECORD_HEADER_SIZE + crate::core::DTLS_HANDSHAKE_HEADER_SIZE + 1,
        );
        self
    }

    /// Set the initial per-flight retransmission timeout and the overall
    /// handshake deadline (both milliseconds). The two budgets are
    /// independent (§3, §5): only the per-flight backoff timer is capped at
    /// `MAX_DTLS_TIMEOUT`, the global deadline is stored as given.
    pub fn with_timeouts(mut self, initial_ms: u64, total_ms: u64) -> Self {
        self.initial_timeout_ms = initial_ms;
        self.total_timeout_ms = total_ms;
        self
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn initial_timeout_ms(&self) -> u64 {
        self.initial_timeout_ms
    }

    pub fn total_timeout_ms(&self) -> u64 {
        self.total_timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_rfc_compliant_starting_point() {
        let cfg = DtlsConfig::new();
        assert_eq!(cfg.initial_timeout_ms(), 1_000);
        assert!(cfg.mtu() > 0);
    }

    #[test]
    fn with_mtu_clamps_below_header_floor() {
        let cfg = DtlsConfig::new().with_mtu(4);
        assert!(cfg.mtu() >= crate::core::DTLS_RECORD_HEADER_SIZE + crate::core::DTLS_HANDSHAKE_HEADER_SIZE + 1);
    }

    #[test]
    fn with_timeouts_overrides_defaults() {
        let cfg = DtlsConfig::new().with_timeouts(500, 10_000);
        assert_eq!(cfg.initial_timeout_ms(), 500);
        assert_eq!(cfg.total_timeout_ms(), 10_000);
    }

    #[test]
    fn total_timeout_is_independent_of_max_dtls_timeout() {
        let cfg = DtlsConfig::new().with_timeouts(1_000, 120_000);
        assert_eq!(cfg.total_timeout_ms(), 120_000);
    }
}
