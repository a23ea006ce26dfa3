//! Drivers, one per instrument family.
//!
//! Current support list:
//!
//! - Attenuator: EXFO (chassis and 3150 module), HP/Agilent/Keysight
//! - Power meter, tunable laser, reference transmitter: HP/Agilent/Keysight Lightwave modules
//! - OSNR generator: YY Labs / OZ Optics
//! - OSA: Yokogawa (AQ6317 command set)
//! - Oscilloscope: Keysight DCA / Infiniium
//! - Optical switch: Polatis
//! - Frequency counter: Keysight 53220A, 53230A, 53132A
//! - BERT: Keysight M8000

pub mod attenuator;
pub mod bert;
pub mod counter;
pub mod osa;
pub mod oscilloscope;
pub mod osnr;
pub mod power_meter;
pub mod reference_transmitter;
pub mod switch;
pub mod tunable_laser;

pub use attenuator::{Attenuator, AttenuatorKind};
pub use bert::Bert;
pub use counter::{CounterModel, FrequencyCounter};
pub use osa::{Osa, OsaTrace, SmsrAnalysis, WdmAnalysis};
pub use oscilloscope::{Oscilloscope, ScopeMode};
pub use osnr::OsnrGenerator;
pub use power_meter::PowerMeter;
pub use reference_transmitter::ReferenceTransmitter;
pub use switch::OpticalSwitch;
pub use tunable_laser::TunableLaser;

use std::fmt;

use crate::error::Result;
use crate::session::Session;

/// Output state of a Lightwave module channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    On,
    Off,
    /// The module answered with something other than 0 or 1.
    Error,
}

impl OutputState {
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim().parse::<i64>() {
            Ok(1) => OutputState::On,
            Ok(0) => OutputState::Off,
            _ => OutputState::Error,
        }
    }
}

impl fmt::Display for OutputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputState::On => "ON",
            OutputState::Off => "OFF",
            OutputState::Error => "ERROR",
        })
    }
}

/// `OUTP<slot>:CHAN<channel>:STAT`, common to every Lightwave module.
pub(crate) fn set_output(session: &mut Session, slot: u32, channel: u32, on: bool) -> Result<()> {
    let state = if on { 1 } else { 0 };
    session.write(&format!("OUTP{slot}:CHAN{channel}:STAT {state}"))
}

pub(crate) fn output_state(session: &mut Session, slot: u32, channel: u32) -> Result<OutputState> {
    let reply = session.query(&format!("OUTP{slot}:CHAN{channel}:STAT?"))?;
    Ok(OutputState::from_reply(&reply))
}

pub(crate) fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_state_parsing() {
        assert_eq!(OutputState::from_reply("1\n"), OutputState::On);
        assert_eq!(OutputState::from_reply("+0"), OutputState::Off);
        assert_eq!(OutputState::from_reply("2"), OutputState::Error);
        assert_eq!(OutputState::from_reply("garbage"), OutputState::Error);
        assert_eq!(OutputState::Off.to_string(), "OFF");
    }
}
