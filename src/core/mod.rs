//! Core types shared across the DTLS reliability core: wire constants and
//! the layered error enums (§7).

mod constants;
mod error;

pub use constants::*;
pub use error::*;
