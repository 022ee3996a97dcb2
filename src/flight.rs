//! Flight transmitter (component D, §4.4) — the heart of DTLS reliability.
//!
//! Owns one outbound handshake flight at a time: fragments it to the path
//! MTU, (re)sends it on a backoff timer, and watches for evidence that the
//! peer's reply flight has arrived. Parsing *which* handshake packet arrived
//! is a handshake-layer concern (out of scope here, §1); callers supply that
//! judgement through the `classify` closure passed to [`FlightTransmitter::transmit`].

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::DtlsConfig;
use crate::core::{
    CONTENT_TYPE_CHANGE_CIPHER_SPEC, DTLS_HANDSHAKE_HEADER_SIZE, FlightError, HANDSHAKE_FINISHED,
    MAX_DTLS_TIMEOUT,
};
use crate::transport::DtlsTransport;
use crate::wire::{delta_ms, now_ms, write_uint16, write_uint24};

/// One handshake message (or a ChangeCipherSpec record) queued in a flight.
#[derive(Debug, Clone)]
pub struct FlightMessage {
    content_type: u8,
    handshake_type: u8,
    seq: u16,
    epoch: u16,
    payload: Vec<u8>,
}

impl FlightMessage {
    /// A handshake message, fragmented to MTU by [`FlightTransmitter::send_flight`].
    pub fn handshake(handshake_type: u8, epoch: u16, seq: u16, payload: Vec<u8>) -> Self {
        Self {
            content_type: crate::core::CONTENT_TYPE_HANDSHAKE,
            handshake_type,
            seq,
            epoch,
            payload,
        }
    }

    /// A ChangeCipherSpec record, sent verbatim and never fragmented (§3).
    pub fn change_cipher_spec(epoch: u16, payload: Vec<u8>) -> Self {
        Self {
            content_type: CONTENT_TYPE_CHANGE_CIPHER_SPEC,
            handshake_type: 0,
            seq: 0,
            epoch,
            payload,
        }
    }
}

/// An ordered, buffered handshake flight (§3). Invariant: messages are
/// retained front-to-back in send order for the lifetime of the flight.
#[derive(Debug, Clone, Default)]
pub struct OutgoingFlight {
    messages: Vec<FlightMessage>,
}

impl OutgoingFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the flight, preserving send order.
    pub fn push(mut self, message: FlightMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// `true` if this flight carries a `Finished` message, making it the
    /// terminal flight of the handshake (§4.4.1).
    fn is_terminal(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.handshake_type == HANDSHAKE_FINISHED)
    }
}

/// What the handshake layer observed about an incoming datagram, fed back
/// into [`FlightTransmitter::transmit`] (§4.4.4 step 1/2f: `is_next_hpacket_expected`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingFlight {
    /// The peer's next flight has arrived; this flight is done.
    NextFlight,
    /// The peer retransmitted its previous flight, meaning our last flight
    /// was lost or not yet acknowledged; retransmit ours.
    Retransmit,
}

/// Per-session DTLS retransmission state (§3's `DtlsState`).
#[derive(Debug)]
struct DtlsState {
    actual_retrans_timeout_ms: u64,
    handshake_start_time: Option<u64>,
    last_retransmit: u64,
    flight_init: bool,
    last_flight: bool,
    blocking: bool,
    packets_dropped: u64,
    hsk_write_seq: u16,
    hsk_read_seq: u16,
    record_seq: u64,
}

impl DtlsState {
    fn new(config: &DtlsConfig) -> Self {
        Self {
            actual_retrans_timeout_ms: config.initial_timeout_ms(),
            handshake_start_time: None,
            last_retransmit: 0,
            flight_init: false,
            last_flight: false,
            blocking: config.initial_timeout_ms() != 0,
            packets_dropped: 0,
            hsk_write_seq: 0,
            hsk_read_seq: 0,
            record_seq: 0,
        }
    }
}

/// Drives one outbound flight through PREPARING → SENDING → WAITING →
/// (retransmit | end-of-flight), per §4.4.1.
pub struct FlightTransmitter<T: DtlsTransport> {
    transport: T,
    config: DtlsConfig,
    state: DtlsState,
    flight: Option<OutgoingFlight>,
}

impl<T: DtlsTransport> FlightTransmitter<T> {
    /// Build a transmitter over `transport`, configured by `config`. No
    /// flight is loaded yet; call [`begin_flight`](Self::begin_flight).
    pub fn new(transport: T, config: DtlsConfig) -> Self {
        let state = DtlsState::new(&config);
        Self {
            transport,
            config,
            state,
            flight: None,
        }
    }

    /// Install `prestate` from a completed cookie exchange (§4.4, §10.6).
    /// Seeds both the handshake write sequence and the record sequence
    /// counter (`gnutls_dtls.c:843`: `write.sequence_number.i[7] =
    /// prestate->record_seq`), so the caller's transport can resume the
    /// record sequence exactly where the client left off instead of
    /// restarting it from zero.
    pub fn install_prestate(&mut self, prestate: &crate::cookie::Prestate) {
        self.state.hsk_read_seq = prestate.hsk_read_seq as u16;
        self.state.hsk_write_seq = prestate.hsk_write_seq as u16 + 1;
        self.state.record_seq = prestate.record_seq as u64;
    }

    /// The handshake message sequence number the next outbound message
    /// should carry, incrementing the internal counter.
    pub fn next_write_seq(&mut self) -> u16 {
        let seq = self.state.hsk_write_seq;
        self.state.hsk_write_seq += 1;
        seq
    }

    /// Current record sequence counter, seeded by [`install_prestate`](Self::install_prestate)
    /// and otherwise starting at 0. Exposed so the transport's record
    /// framing (out of scope here, §1) can seed its own sequence counter.
    pub fn record_seq(&self) -> u64 {
        self.state.record_seq
    }

    /// The record sequence number the next outbound record should carry,
    /// incrementing the internal counter first (scenario 6: the first
    /// record after a cookie exchange begins at `prestate.record_seq + 1`).
    pub fn next_record_seq(&mut self) -> u64 {
        self.state.record_seq += 1;
        self.state.record_seq
    }

    /// Load a newly prepared flight, resetting per-flight timer state.
    /// Does not reset the overall handshake clock, which starts on the
    /// very first call to [`transmit`](Self::transmit).
    pub fn begin_flight(&mut self, flight: OutgoingFlight) {
        self.state.actual_retrans_timeout_ms = self.config.initial_timeout_ms();
        self.state.flight_init = false;
        self.state.last_flight = flight.is_terminal();
        self.flight = Some(flight);
    }

    /// Number of records the replay window has discarded (§10.6, `get_discarded`).
    pub fn discarded_count(&self) -> u64 {
        self.state.packets_dropped
    }

    /// Record that the replay window dropped a record, for `discarded_count`.
    pub fn note_discarded(&mut self) {
        self.state.packets_dropped += 1;
    }

    /// Milliseconds until the next retransmit is due, `0` if already due
    /// (§10.6, `get_timeout`).
    pub fn get_timeout(&self) -> u64 {
        if !self.state.flight_init {
            return 0;
        }
        let elapsed = delta_ms(now_ms(), self.state.last_retransmit);
        self.state
            .actual_retrans_timeout_ms
            .saturating_sub(elapsed)
    }

    /// Usable handshake-message MTU after subtracting record overhead and
    /// the handshake fragment header (§4.4.6).
    pub fn data_mtu(&self) -> usize {
        let epoch = self.flight.as_ref().and_then(|f| f.messages.first()).map(|m| m.epoch).unwrap_or(0);
        self.config
            .mtu()
            .saturating_sub(self.transport.record_overhead(epoch))
    }

    fn frag_mtu(&self) -> usize {
        self.data_mtu().saturating_sub(DTLS_HANDSHAKE_HEADER_SIZE).max(1)
    }

    /// Advance the flight state machine by exactly one outer-loop iteration
    /// (§4.4.4). `classify` inspects an arrived datagram and reports whether
    /// it's the peer's next flight or a retransmit of their previous one;
    /// it is not called when no datagram is available.
    pub fn transmit(
        &mut self,
        mut classify: impl FnMut(&[u8]) -> IncomingFlight,
    ) -> Result<(), FlightError> {
        if self.flight.is_none() {
            return Ok(());
        }
        if self.state.handshake_start_time.is_none() {
            self.state.handshake_start_time = Some(now_ms());
        }

        // Step 1: already sent at least once, non-blocking mode, not yet terminal.
        if self.state.flight_init && !self.state.blocking && !self.state.last_flight {
            match self.transport.try_recv().map_err(FlightError::Io)? {
                Some(data) => match classify(&data) {
                    IncomingFlight::NextFlight => {
                        self.end_flight();
                        return Ok(());
                    }
                    IncomingFlight::Retransmit => {
                        // Peer retransmitted its previous flight: fall through to
                        // the loop below, which resends ours only once the timer
                        // gate allows it (`_dtls_retransmit` transmits at most
                        // once per backoff window, not once per duplicate).
                        debug!("peer retransmitted previous flight");
                    }
                },
                None => {
                    let now = now_ms();
                    if delta_ms(now, self.state.last_retransmit) < self.state.actual_retrans_timeout_ms {
                        return Err(FlightError::Again);
                    }
                }
            }
        }

        loop {
            let now = now_ms();
            let start = self.state.handshake_start_time.expect("set above");
            if delta_ms(now, start) >= self.config.total_timeout_ms() {
                warn!("handshake global timeout exceeded");
                self.end_flight();
                return Err(FlightError::TimedOut);
            }

            if !self.state.flight_init
                || delta_ms(now, self.state.last_retransmit) >= self.state.actual_retrans_timeout_ms
            {
                self.send_flight().map_err(FlightError::Io)?;
                self.state.last_retransmit = now_ms();

                if !self.state.flight_init {
                    self.state.flight_init = true;
                    self.state.actual_retrans_timeout_ms = self.config.initial_timeout_ms();
                    self.state.last_flight =
                        self.flight.as_ref().map(OutgoingFlight::is_terminal).unwrap_or(false);
                    trace!("sent initial flight");
                } else {
                    self.state.actual_retrans_timeout_ms =
                        self.state.actual_retrans_timeout_ms.saturating_mul(2);
                    if self.state.actual_retrans_timeout_ms > MAX_DTLS_TIMEOUT {
                        self.state.actual_retrans_timeout_ms %= MAX_DTLS_TIMEOUT;
                    }
                    debug!(
                        next_timeout_ms = self.state.actual_retrans_timeout_ms,
                        "retransmitted flight"
                    );
                }
            }

            if self.state.last_flight {
                return Ok(());
            }

            let waited = if self.state.blocking {
                self.transport
                    .recv_blocking(Duration::from_millis(self.state.actual_retrans_timeout_ms))
                    .map_err(FlightError::Io)?
            } else {
                match self.transport.try_recv().map_err(FlightError::Io)? {
                    Some(data) => Some(data),
                    None => return Err(FlightError::Again),
                }
            };

            match waited {
                Some(data) => match classify(&data) {
                    IncomingFlight::NextFlight => {
                        self.end_flight();
                        return Ok(());
                    }
                    // Loop back to the top: the timer gate above decides
                    // whether this duplicate actually earns a resend.
                    IncomingFlight::Retransmit => continue,
                },
                None => continue,
            }
        }
    }

    /// Used only for the terminal flight (§4.4.5): wait out the backoff
    /// timer once, resending the terminal flight if it elapses.
    pub fn wait_and_retransmit(&mut self) -> Result<(), FlightError> {
        if self.flight.is_none() || !self.state.last_flight {
            return Ok(());
        }

        let waited = if self.state.blocking {
            self.transport
                .recv_blocking(Duration::from_millis(self.state.actual_retrans_timeout_ms))
                .map_err(FlightError::Io)?
        } else {
            self.transport.try_recv().map_err(FlightError::Io)?
        };

        match waited {
            Some(_) => {
                self.state.actual_retrans_timeout_ms = self.config.initial_timeout_ms();
                Ok(())
            }
            None => {
                debug!("resending terminal flight after timeout");
                self.send_flight().map_err(FlightError::Io)?;
                self.state.last_retransmit = now_ms();
                Err(FlightError::Again)
            }
        }
    }

    fn end_flight(&mut self) {
        self.flight = None;
        self.state.flight_init = false;
        self.state.last_flight = false;
    }

    fn send_flight(&mut self) -> std::io::Result<()> {
        let frag_mtu = self.frag_mtu();
        let Some(flight) = self.flight.clone() else {
            return Ok(());
        };

        for msg in &flight.messages {
            if msg.content_type == CONTENT_TYPE_CHANGE_CIPHER_SPEC {
                self.transport.send(msg.epoch, &msg.payload)?;
                continue;
            }

            let data_size = msg.payload.len();
            let mut offset = 0usize;
            while offset <= data_size {
                let remaining = data_size - offset;
                let frag_len = remaining.min(frag_mtu);

                let mut buf = vec![0u8; DTLS_HANDSHAKE_HEADER_SIZE + frag_len];
                buf[0] = msg.handshake_type;
                write_uint24(data_size as u32, &mut buf, 1);
                write_uint16(msg.seq, &mut buf, 4);
                write_uint24(offset as u32, &mut buf, 6);
                write_uint24(frag_len as u32, &mut buf, 9);
                buf[DTLS_HANDSHAKE_HEADER_SIZE..].copy_from_slice(&msg.payload[offset..offset + frag_len]);

                self.transport.send(msg.epoch, &buf)?;
                offset += frag_mtu;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;

    fn config() -> DtlsConfig {
        DtlsConfig::new().with_mtu(512).with_timeouts(1_000, 60_000)
    }

    fn two_message_flight() -> OutgoingFlight {
        OutgoingFlight::new()
            .push(FlightMessage::handshake(1, 0, 0, vec![0xAB; 200]))
            .push(FlightMessage::handshake(11, 0, 1, vec![0xCD; 800]))
    }

    #[test]
    fn fragments_messages_to_mtu() {
        let (a, mut b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        tx.begin_flight(two_message_flight());
        tx.send_flight().unwrap();

        let mut records = Vec::new();
        while let Some(r) = b.try_recv().unwrap() {
            records.push(r);
        }
        // 200-byte message fits one record; 800-byte message with
        // frag_mtu = 512 - 12 = 500 needs two (500 + 300).
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].len() - DTLS_HANDSHAKE_HEADER_SIZE, 200);
        assert_eq!(records[1].len() - DTLS_HANDSHAKE_HEADER_SIZE, 500);
        assert_eq!(records[2].len() - DTLS_HANDSHAKE_HEADER_SIZE, 300);
    }

    #[test]
    fn happy_path_ends_without_retransmit() {
        let (a, mut b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        tx.begin_flight(two_message_flight());

        // Peer drains the flight and replies promptly, well inside the
        // 1 second retransmit timer, so `transmit` should block only on
        // that reply and never retransmit.
        let responder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            while b.try_recv().unwrap().is_some() {}
            b.send(0, b"reply").unwrap();
        });

        let result = tx.transmit(|_| IncomingFlight::NextFlight);
        assert!(result.is_ok());
        responder.join().unwrap();
    }

    #[test]
    fn terminal_flight_returns_ok_without_waiting() {
        let (a, _b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        let flight = OutgoingFlight::new().push(FlightMessage::handshake(
            HANDSHAKE_FINISHED,
            1,
            0,
            vec![0u8; 16],
        ));
        tx.begin_flight(flight);

        let result = tx.transmit(|_| IncomingFlight::NextFlight);
        assert!(result.is_ok());
    }

    #[test]
    fn wait_and_retransmit_resends_terminal_flight_on_timeout() {
        let (a, mut b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(
            a,
            DtlsConfig::new().with_mtu(512).with_timeouts(30, 60_000),
        );
        let flight = OutgoingFlight::new().push(FlightMessage::handshake(
            HANDSHAKE_FINISHED,
            1,
            0,
            vec![0u8; 16],
        ));
        tx.begin_flight(flight);
        tx.transmit(|_| IncomingFlight::NextFlight).unwrap();
        while b.try_recv().unwrap().is_some() {}

        let result = tx.wait_and_retransmit();
        assert!(matches!(result, Err(FlightError::Again)));
        assert!(b.try_recv().unwrap().is_some());
    }

    #[test]
    fn non_blocking_mode_returns_again_until_data_ready() {
        let (a, mut b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, DtlsConfig::new().with_mtu(512).with_timeouts(0, 60_000));
        tx.begin_flight(two_message_flight());

        let first = tx.transmit(|_| IncomingFlight::Retransmit);
        assert!(matches!(first, Err(FlightError::Again)));

        while b.try_recv().unwrap().is_some() {}
        b.send(0, b"reply").unwrap();

        let second = tx.transmit(|_| IncomingFlight::NextFlight);
        assert!(second.is_ok());
    }

    #[test]
    fn global_timeout_fails_handshake() {
        let (a, _b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(
            a,
            DtlsConfig::new().with_mtu(512).with_timeouts(20, 60),
        );
        tx.begin_flight(two_message_flight());

        let mut outcome = tx.transmit(|_| IncomingFlight::Retransmit);
        let started = std::time::Instant::now();
        while outcome.is_err() && matches!(outcome, Err(FlightError::Again)) {
            outcome = tx.transmit(|_| IncomingFlight::Retransmit);
            if started.elapsed() > Duration::from_secs(2) {
                break;
            }
        }
        assert!(matches!(outcome, Err(FlightError::TimedOut)));
    }

    #[test]
    fn change_cipher_spec_is_sent_unfragmented() {
        let (a, mut b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        let flight = OutgoingFlight::new().push(FlightMessage::change_cipher_spec(1, vec![1u8]));
        tx.begin_flight(flight);
        tx.send_flight().unwrap();

        assert_eq!(b.try_recv().unwrap(), Some(vec![1u8]));
        assert_eq!(b.try_recv().unwrap(), None);
    }

    #[test]
    fn discarded_count_tracks_note_discarded() {
        let (a, _b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        assert_eq!(tx.discarded_count(), 0);
        tx.note_discarded();
        tx.note_discarded();
        assert_eq!(tx.discarded_count(), 2);
    }

    #[test]
    fn install_prestate_sets_next_write_seq() {
        let (a, _b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        let prestate = crate::cookie::Prestate {
            record_seq: 5,
            hsk_read_seq: 2,
            hsk_write_seq: 0,
        };
        tx.install_prestate(&prestate);
        assert_eq!(tx.next_write_seq(), 1);
        assert_eq!(tx.next_write_seq(), 2);
    }

    #[test]
    fn install_prestate_seeds_record_seq_counter() {
        let (a, _b) = ChannelTransport::pair();
        let mut tx = FlightTransmitter::new(a, config());
        let prestate = crate::cookie::Prestate {
            record_seq: 5,
            hsk_read_seq: 2,
            hsk_write_seq: 0,
        };
        tx.install_prestate(&prestate);
        assert_eq!(tx.record_seq(), 5);
        assert_eq!(tx.next_record_seq(), 6);
        assert_eq!(tx.record_seq(), 6);
    }
}
