//! Transport abstraction the flight transmitter pushes records through
//! (§10.2). Production code plugs in a real UDP socket; tests use
//! [`ChannelTransport`], an in-memory pair connected by channels.

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::time::Duration;

/// What a DTLS flight transmitter needs from the thing underneath it: push a
/// datagram for a given epoch, and pull the next one back, blocking or not.
pub trait DtlsTransport {
    /// Send one complete datagram under `epoch`. Never fragments internally;
    /// callers are expected to have already sized `data` to fit the path MTU.
    fn send(&mut self, epoch: u16, data: &[u8]) -> io::Result<()>;

    /// Return the next datagram without blocking, or `Ok(None)` if nothing
    /// is available right now.
    fn try_recv(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Block up to `timeout` for the next datagram.
    fn recv_blocking(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>>;

    /// Per-epoch framing overhead subtracted from the configured MTU to get
    /// the usable data MTU (§4.4.6): normally the plain DTLS record header,
    /// growing once a cipher is installed on that epoch. Record protection
    /// is out of scope here, so the default is just the record header.
    fn record_overhead(&self, epoch: u16) -> usize {
        let _ = epoch;
        crate::core::DTLS_RECORD_HEADER_SIZE
    }
}

/// In-memory transport pair for tests: each endpoint holds the receiving
/// half of a channel and the sending half of its peer's.
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    buffered: VecDeque<Vec<u8>>,
}

impl ChannelTransport {
    /// Build a connected pair: `(a, b)`, where whatever `a` sends, `b`
    /// receives, and vice versa.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (tx_ab, rx_ab) = std::sync::mpsc::channel();
        let (tx_ba, rx_ba) = std::sync::mpsc::channel();
        (
            ChannelTransport {
                tx: tx_ab,
                rx: rx_ba,
                buffered: VecDeque::new(),
            },
            ChannelTransport {
                tx: tx_ba,
                rx: rx_ab,
                buffered: VecDeque::new(),
            },
        )
    }

    /// Drop the next `n` datagrams this endpoint would otherwise receive,
    /// simulating packet loss for retransmission tests.
    pub fn drop_next_incoming(&mut self, n: usize) {
        for _ in 0..n {
            match self.rx.recv_timeout(Duration::from_millis(50)) {
                Ok(_) => {}
                Err(_) => break,
            }
        }
    }
}

impl DtlsTransport for ChannelTransport {
    fn send(&mut self, _epoch: u16, data: &[u8]) -> io::Result<()> {
        self.tx
            .send(data.to_vec())
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))
    }

    fn try_recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(buf) = self.buffered.pop_front() {
            return Ok(Some(buf));
        }
        match self.rx.try_recv() {
            Ok(buf) => Ok(Some(buf)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
            }
        }
    }

    fn recv_blocking(&mut self, timeout: Duration) -> io::Result<Option<Vec<u8>>> {
        if let Some(buf) = self.buffered.pop_front() {
            return Ok(Some(buf));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(buf) => Ok(Some(buf)),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
            }
        }
    }

    fn record_overhead(&self, _epoch: u16) -> usize {
        0
    }
}
