//! Lightwave tunable laser sources (816xx and N77xx modules).

use super::{set_output, OutputState};
use crate::config::Timing;
use crate::error::Result;
use crate::session::Session;

pub struct TunableLaser {
    session: Session,
}

impl TunableLaser {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Ok(Self::new(Session::connect(address, nickname, timing)?))
    }

    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    pub fn set_wavelength(&mut self, slot: u32, channel: u32, nm: f64) -> Result<()> {
        self.session
            .write(&format!(":SOUR{slot}:CHAN{channel}:WAV {nm}nm"))
    }

    /// Output wavelength in meters.
    pub fn wavelength(&mut self, slot: u32, channel: u32) -> Result<f64> {
        self.session
            .query_f64(&format!(":SOUR{slot}:CHAN{channel}:WAV?"))
    }

    /// Output power in dBm.
    pub fn power(&mut self, slot: u32, channel: u32) -> Result<f64> {
        self.session
            .query_f64(&format!(":SOUR{slot}:CHAN{channel}:POW?"))
    }

    pub fn state(&mut self, slot: u32, channel: u32) -> Result<OutputState> {
        let reply = self
            .session
            .query(&format!(":OUTP{slot}:CHAN{channel}:STAT?"))?;
        Ok(OutputState::from_reply(&reply))
    }

    pub fn enable(&mut self, slot: u32, channel: u32) -> Result<()> {
        set_output(&mut self.session, slot, channel, true)
    }

    pub fn disable(&mut self, slot: u32, channel: u32) -> Result<()> {
        set_output(&mut self.session, slot, channel, false)
    }
}
