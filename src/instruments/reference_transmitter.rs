//! Lightwave 81490A/B reference transmitters.

use tracing::info;

use super::{set_output, OutputState};
use crate::config::Timing;
use crate::error::Result;
use crate::session::Session;

pub struct ReferenceTransmitter {
    session: Session,
}

impl ReferenceTransmitter {
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

    /// Output wavelength in meters.
    pub fn wavelength(&mut self, slot: u32, channel: u32) -> Result<f64> {
        self.session
            .query_f64(&format!(":SOUR{slot}:CHAN{channel}:WAV?"))
    }

    /// Start the transmitter's internal recalibration.
    pub fn recalibrate(&mut self, slot: u32) -> Result<()> {
        info!(slot, "recalibrating reference transmitter");
        self.session.write(&format!("SOUR{slot}:TRAN:REC"))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn recalibration_and_state() {
        let mock = MockTransport::new();
        let mut tx = ReferenceTransmitter::new(Session::with_transport(
            "GPIB0::22::INSTR",
            "Ref Tx",
            Box::new(mock.clone()),
            Timing::immediate(),
        ));
        tx.recalibrate(3).unwrap();
        assert_eq!(mock.writes(), vec!["SOUR3:TRAN:REC".to_string()]);
        mock.respond(":OUTP3:CHAN1:STAT?", "+1");
        assert_eq!(tx.state(3, 1).unwrap(), OutputState::On);
    }
}
