//! Connection to one instrument, shared by every family driver.
//!
//! A [`Session`] owns the transport plus the retry policies the drivers use.
//! Bench instruments occasionally drop a reply or wedge after a timeout, so
//! most getters make exactly one more attempt after a clear or a reconnect.

use std::thread;

use tracing::{debug, info, warn};

use crate::address::ResourceAddress;
use crate::config::Timing;
use crate::error::{Error, Result};
use crate::transport::{self, Transport};

/// The four comma-separated fields of an `*IDN?` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl Identity {
    pub fn parse(reply: &str) -> Self {
        let mut fields = reply.split(',').map(|f| f.trim().to_string());
        Self {
            manufacturer: fields.next().unwrap_or_default(),
            model: fields.next().unwrap_or_default(),
            serial: fields.next().unwrap_or_default(),
            firmware: fields.next().unwrap_or_default(),
        }
    }
}

pub struct Session {
    address: String,
    nickname: String,
    timing: Timing,
    transport: Box<dyn Transport>,
}

impl Session {
    /// Open the resource and clear it.
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        let parsed: ResourceAddress = address.parse()?;
        let transport =
            transport::open(&parsed, timing.io_timeout).map_err(|e| match e {
                Error::FeatureNotEnabled(_) => e,
                other => Error::Connection {
                    address: address.to_string(),
                    reason: other.to_string(),
                },
            })?;
        Self::attach(&parsed.to_string(), nickname, transport, timing)
    }

    /// Wrap an open transport and clear the device.
    pub fn attach(
        address: &str,
        nickname: &str,
        transport: Box<dyn Transport>,
        timing: Timing,
    ) -> Result<Self> {
        let mut session = Self::with_transport(address, nickname, transport, timing);
        session.clear().map_err(|e| Error::Connection {
            address: address.to_string(),
            reason: e.to_string(),
        })?;
        info!(address, nickname, "connected");
        Ok(session)
    }

    /// Wrap an already open transport. Nothing is sent.
    pub fn with_transport(
        address: &str,
        nickname: &str,
        transport: Box<dyn Transport>,
        timing: Timing,
    ) -> Self {
        Self {
            address: address.to_string(),
            nickname: nickname.to_string(),
            timing,
            transport,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn set_nickname(&mut self, nickname: &str) {
        self.nickname = nickname.to_string();
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn write(&mut self, command: &str) -> Result<()> {
        debug!(nickname = %self.nickname, command, "write");
        self.transport.write(command)
    }

    pub fn query(&mut self, command: &str) -> Result<String> {
        let response = self.transport.query(command)?;
        debug!(nickname = %self.nickname, command, %response, "query");
        Ok(response)
    }

    /// Query and parse the reply as a number.
    pub fn query_f64(&mut self, command: &str) -> Result<f64> {
        let response = self.query(command)?;
        parse_number(command, &response)
    }

    /// Device clear, then give the instrument time to recover.
    pub fn clear(&mut self) -> Result<()> {
        self.transport.clear()?;
        self.settle(self.timing.clear_settle);
        Ok(())
    }

    /// Probe with `*IDN?` and reopen the link if the probe fails or comes back empty.
    pub fn refresh_connection(&mut self) -> Result<()> {
        match self.transport.query("*IDN?") {
            Ok(reply) if !reply.trim().is_empty() => Ok(()),
            Ok(_) => {
                warn!(address = %self.address, "empty identification, reopening");
                self.transport.reopen()
            }
            Err(e) => {
                warn!(address = %self.address, error = %e, "identification failed, reopening");
                self.transport.reopen()
            }
        }
    }

    pub fn idn(&mut self) -> Result<String> {
        self.clear()?;
        self.query("*IDN?")
            .map_err(|e| Error::UnknownInstrument(format!("{}: {e}", self.address)))
    }

    pub fn identity(&mut self) -> Result<Identity> {
        Ok(Identity::parse(&self.idn()?))
    }

    /// Installed options, one entry per chassis slot on Lightwave mainframes.
    pub fn slot_idns(&mut self) -> Result<String> {
        self.refresh_connection()?;
        self.clear()?;
        self.query("*OPT?")
    }

    pub fn reset(&mut self) -> Result<()> {
        self.write("*RST")
    }

    pub fn close(&mut self) -> Result<()> {
        info!(address = %self.address, "closing");
        self.transport.close()
    }

    /// On failure refresh the connection and query once more.
    pub fn query_retry_refresh(&mut self, command: &str) -> Result<String> {
        match self.query(command) {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(command, error = %e, "query failed, refreshing connection");
                self.refresh_connection()?;
                self.query(command)
            }
        }
    }

    /// On failure clear the device and query once more.
    pub fn query_retry_clear(&mut self, command: &str) -> Result<String> {
        match self.query(command) {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(command, error = %e, "query failed, clearing");
                self.clear()?;
                self.query(command)
            }
        }
    }

    /// Refresh, query; on failure clear, refresh and query once more.
    pub fn query_retry_clear_refresh(&mut self, command: &str) -> Result<String> {
        let first = self
            .refresh_connection()
            .and_then(|_| self.query(command));
        match first {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(command, error = %e, "query failed, clearing and refreshing");
                self.transport.clear()?;
                self.refresh_connection()?;
                self.query(command)
            }
        }
    }

    /// On failure send the same query once more, untouched.
    pub fn query_retry(&mut self, command: &str) -> Result<String> {
        match self.query(command) {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!(command, error = %e, "query failed, retrying");
                self.query(command)
            }
        }
    }

    /// Sleep for a configured settle time.
    pub fn settle(&self, duration: std::time::Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

pub(crate) fn parse_number(command: &str, response: &str) -> Result<f64> {
    response
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::parse(command, response))
}
