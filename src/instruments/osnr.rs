//! YY Labs / OZ Optics OSNR generator.
//!
//! The generator speaks a terse non-SCPI dialect (`ASE1`, `RL20DB`, ...).

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::session::{parse_number, Session};
use crate::units::round_to;

/// Step for coarse OSNR adjustment, in dB.
pub const COARSE_STEP: f64 = 1.0;
/// Step for fine OSNR adjustment, in dB.
pub const FINE_STEP: f64 = 0.2;

pub struct OsnrGenerator {
    session: Session,
}

impl OsnrGenerator {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Ok(Self::new(Session::connect(address, nickname, timing)?))
    }

    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn enable_ase(&mut self) -> Result<()> {
        self.session.write("ASE1")
    }

    pub fn disable_ase(&mut self) -> Result<()> {
        self.session.write("ASE0")
    }

    pub fn enable_edfa(&mut self) -> Result<()> {
        self.session.write("EDFA1")
    }

    pub fn disable_edfa(&mut self) -> Result<()> {
        self.session.write("EDFA0")
    }

    /// ASE source and amplifier together.
    pub fn enable(&mut self) -> Result<()> {
        self.enable_ase()?;
        self.enable_edfa()
    }

    pub fn disable(&mut self) -> Result<()> {
        self.disable_ase()?;
        self.disable_edfa()
    }

    pub fn set_itu_channel(&mut self, channel: u32) -> Result<()> {
        self.session.write(&format!("CH{channel}"))
    }

    pub fn itu_channel(&mut self) -> Result<String> {
        Ok(self.session.query("CH?")?.trim().to_string())
    }

    pub fn set_osnr(&mut self, db: f64) -> Result<()> {
        self.session.write(&format!("RL{db}DB"))
    }

    /// Current OSNR setting in dB.
    ///
    /// Firmware replies to `R?DB` are not reliable; expect the occasional
    /// parse error.
    pub fn osnr(&mut self) -> Result<f64> {
        let command = "R?DB";
        let reply = self.session.query(command)?;
        let field = reply
            .split_whitespace()
            .nth(4)
            .ok_or_else(|| Error::parse(command, &reply))?;
        let digits: String = field.chars().take(5).collect();
        parse_number(command, &digits)
    }

    /// Move the OSNR by `delta` dB relative to the current setting.
    pub fn step_osnr(&mut self, delta: f64) -> Result<f64> {
        let target = round_to(self.osnr()? + delta, 2);
        self.set_osnr(target)?;
        Ok(target)
    }

    pub fn set_input_power_ref(&mut self, dbm: f64) -> Result<()> {
        self.session.write(&format!("RP{dbm}"))
    }

    pub fn input_power_ref(&mut self) -> Result<String> {
        Ok(self.session.query("RP?")?.trim().to_string())
    }

    pub fn set_output_power(&mut self, dbm: f64) -> Result<()> {
        self.session.write(&format!("PL{dbm}DBM"))
    }

    pub fn output_power(&mut self) -> Result<String> {
        Ok(self.session.query("PO?")?.trim().to_string())
    }

    /// Latch the present input power as the reference.
    pub fn lock_input_power(&mut self) -> Result<()> {
        self.session.write("LPI")
    }
}
