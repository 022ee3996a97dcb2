//! # dtls-reliability
//!
//! The retransmission, fragmentation, anti-replay, and stateless-cookie
//! machinery a DTLS (Datagram TLS) implementation needs on top of an
//! ordinary TLS state machine, to run over an unreliable datagram
//! transport such as UDP.
//!
//! This crate deliberately excludes the TLS cryptographic handshake
//! itself, application-data record encryption, and any credential
//! configuration surface — those are the concern of the library this core
//! is embedded in. What's here:
//!
//! - [`wire`]: fixed-endian wire codec (`uint16`/`uint24`/`uint48`) and a
//!   monotonic millisecond clock.
//! - [`replay`]: per-epoch sliding-window anti-replay filter over 48-bit
//!   record sequence numbers.
//! - [`cookie`]: stateless HMAC-based HelloVerifyRequest cookie exchange.
//! - [`flight`]: the flight transmitter — fragmentation, retransmission
//!   timers, and the send/wait state machine.
//! - [`transport`]: the `DtlsTransport` trait flights are pushed through,
//!   plus an in-memory `ChannelTransport` for tests.
//! - [`config`]: a small builder gathering MTU and timeout settings.
//! - [`core`]: shared wire constants and the layered error types.
//!
//! ## Example
//!
//! ```
//! use dtls_reliability::config::DtlsConfig;
//! use dtls_reliability::flight::{FlightMessage, FlightTransmitter, IncomingFlight, OutgoingFlight};
//! use dtls_reliability::transport::ChannelTransport;
//!
//! let (client_transport, _server_transport) = ChannelTransport::pair();
//! let config = DtlsConfig::new().with_mtu(512);
//! let mut transmitter = FlightTransmitter::new(client_transport, config);
//!
//! let flight = OutgoingFlight::new().push(FlightMessage::handshake(1, 0, 0, vec![0u8; 64]));
//! transmitter.begin_flight(flight);
//! // First call always sends; with nobody listening it reports `Again`/`TimedOut`
//! // depending on configured timeouts once the backoff window elapses.
//! let _ = transmitter.transmit(|_| IncomingFlight::Retransmit);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod cookie;
pub mod core;
pub mod flight;
pub mod replay;
pub mod transport;
pub mod wire;

pub use core::DtlsError;
