//! Command layer for optical lab test equipment.
//!
//! Instruments are reached over GPIB/VXI-11 (through VISA, feature `visa`) or
//! raw SCPI sockets. Every family driver wraps a [`session::Session`], which
//! owns the transport and the retry policies.

pub mod address;
pub mod capture;
pub mod chassis;
pub mod config;
pub mod error;
pub mod instruments;
pub mod readout;
pub mod session;
pub mod transport;
pub mod units;

pub use error::{Error, Result};
pub use session::Session;
