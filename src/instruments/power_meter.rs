//! Lightwave optical power sensors (8163x/8164x/8166x modules).

use tracing::warn;

use super::{output_state, set_output, OutputState};
use crate::config::Timing;
use crate::error::Result;
use crate::session::{parse_number, Session};
use crate::units::PowerUnit;

pub struct PowerMeter {
    session: Session,
}

impl PowerMeter {
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

    pub fn set_unit(&mut self, slot: u32, channel: u32, unit: PowerUnit) -> Result<()> {
        self.session.refresh_connection()?;
        self.session.write(&format!(
            ":SENS{slot}:CHAN{channel}:POW:UNIT {}",
            unit.to_command_value()
        ))
    }

    /// Selected unit, or `None` when the meter cannot tell.
    pub fn unit(&mut self, slot: u32, channel: u32) -> Option<PowerUnit> {
        let command = format!(":SENS{slot}:CHAN{channel}:POW:UNIT?");
        let reply = self
            .session
            .refresh_connection()
            .and_then(|_| self.session.query(&command));
        match reply {
            Ok(reply) => reply.trim().parse::<i64>().ok().and_then(PowerUnit::from_code),
            Err(e) => {
                warn!(command, error = %e, "unit query failed");
                None
            }
        }
    }

    /// Calibration wavelength, in nanometers.
    pub fn set_wavelength(&mut self, slot: u32, channel: u32, nm: f64) -> Result<()> {
        self.session.refresh_connection()?;
        self.session
            .write(&format!("SENSE{slot}:CHAN{channel}:POWER:WAVELENGTH {nm}nm"))
    }

    /// Calibration wavelength in meters.
    pub fn wavelength(&mut self, slot: u32, channel: u32) -> Result<f64> {
        let command = format!("SENSE{slot}:CHAN{channel}:POWER:WAVELENGTH?");
        let reply = self.session.query_retry_clear_refresh(&command)?;
        parse_number(&command, &reply)
    }

    /// Latest reading, in whatever unit the sensor is set to.
    pub fn power(&mut self, slot: u32, channel: u32) -> Result<f64> {
        let command = format!(":FETC{slot}:CHAN{channel}:POW?");
        let reply = self.session.query_retry_clear_refresh(&command)?;
        parse_number(&command, &reply)
    }

    pub fn enable(&mut self, slot: u32, channel: u32) -> Result<()> {
        set_output(&mut self.session, slot, channel, true)
    }

    pub fn disable(&mut self, slot: u32, channel: u32) -> Result<()> {
        set_output(&mut self.session, slot, channel, false)
    }

    pub fn state(&mut self, slot: u32, channel: u32) -> Result<OutputState> {
        output_state(&mut self.session, slot, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Exchange, MockTransport};

    fn meter(mock: &MockTransport) -> PowerMeter {
        mock.respond("*IDN?", "Agilent Technologies,8163B,DE1,V5");
        PowerMeter::new(Session::with_transport(
            "GPIB0::20::INSTR",
            "PM",
            Box::new(mock.clone()),
            Timing::immediate(),
        ))
    }

    #[test]
    fn unit_codes_map_to_units() {
        let mock = MockTransport::new();
        let mut pm = meter(&mock);
        mock.respond(":SENS2:CHAN1:POW:UNIT?", "+1");
        assert_eq!(pm.unit(2, 1), Some(PowerUnit::Watt));
        mock.respond(":SENS2:CHAN2:POW:UNIT?", "5");
        assert_eq!(pm.unit(2, 2), None);
        assert_eq!(pm.unit(3, 1), None);
    }

    #[test]
    fn set_unit_refreshes_first() {
        let mock = MockTransport::new();
        let mut pm = meter(&mock);
        pm.set_unit(1, 2, PowerUnit::Dbm).unwrap();
        assert_eq!(
            mock.log(),
            vec![
                Exchange::Query("*IDN?".into()),
                Exchange::Write(":SENS1:CHAN2:POW:UNIT 0".into()),
            ]
        );
    }

    #[test]
    fn power_retries_after_clear() {
        let mock = MockTransport::new();
        let mut pm = meter(&mock);
        mock.fail(":FETC1:CHAN1:POW?")
            .respond(":FETC1:CHAN1:POW?", "-1.234E+01");
        assert_eq!(pm.power(1, 1).unwrap(), -12.34);
        assert_eq!(mock.count(&Exchange::Clear), 1);
    }

    #[test]
    fn wavelength_is_in_meters() {
        let mock = MockTransport::new();
        let mut pm = meter(&mock);
        mock.respond("SENSE1:CHAN1:POWER:WAVELENGTH?", "+1.55000000E-006");
        assert!((pm.wavelength(1, 1).unwrap() - 1.55e-6).abs() < 1e-15);
        pm.set_wavelength(1, 1, 1310.0).unwrap();
        assert_eq!(
            mock.writes(),
            vec!["SENSE1:CHAN1:POWER:WAVELENGTH 1310nm".to_string()]
        );
    }
}
