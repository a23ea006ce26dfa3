//! Variable optical attenuators.
//!
//! EXFO units come in two flavours: a multi-slot chassis addressed with
//! `LINS00<chassis><slot>` prefixes, and the stand-alone 3150 module that takes
//! bare commands and reports attenuation and wavelength with different sign and
//! unit conventions. HP/Agilent/Keysight modules are addressed by slot only.
//! Callers always pass `(chassis, slot)`; the kinds that do not need one ignore it.

use std::fmt;

use tracing::info;

use super::{output_state, set_output, OutputState};
use crate::config::Timing;
use crate::error::{Error, Result};
use crate::session::{parse_number, Session};
use crate::units::nm_to_m;

/// Readings above this many meters are stale and get re-queried.
const MAX_WAVELENGTH_M: f64 = 2e-6;
const WAVELENGTH_REQUERIES: usize = 2;
const EXFO_MODULE_MODEL: &str = "3150";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttenuatorKind {
    ExfoChassis,
    ExfoModule,
    Keysight,
}

impl AttenuatorKind {
    /// Classify from the `*IDN?` reply.
    pub fn detect(idn: &str) -> Self {
        let compact: String = idn.chars().filter(|c| *c != ' ').collect();
        let is_exfo = compact
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("EXFO"));
        if !is_exfo {
            return AttenuatorKind::Keysight;
        }
        let model = idn
            .split_whitespace()
            .nth(1)
            .and_then(|token| token.split('-').nth(1))
            .and_then(|m| m.split(',').next());
        if model == Some(EXFO_MODULE_MODEL) {
            AttenuatorKind::ExfoModule
        } else {
            AttenuatorKind::ExfoChassis
        }
    }
}

impl fmt::Display for AttenuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttenuatorKind::ExfoChassis => "EXFO chassis",
            AttenuatorKind::ExfoModule => "EXFO module",
            AttenuatorKind::Keysight => "HP/Agilent/Keysight",
        })
    }
}

/// Negate without producing `-0`.
fn negate(value: f64) -> f64 {
    0.0 - value
}

fn lins(chassis: u32, slot: u32) -> String {
    format!("LINS00{chassis}{slot}")
}

pub struct Attenuator {
    session: Session,
    kind: AttenuatorKind,
}

impl Attenuator {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Self::new(Session::connect(address, nickname, timing)?)
    }

    /// Identify the unit and pick its command dialect.
    pub fn new(mut session: Session) -> Result<Self> {
        let idn = session.idn()?;
        let kind = AttenuatorKind::detect(&idn);
        info!(address = session.address(), %kind, "attenuator identified");
        Ok(Self { session, kind })
    }

    pub fn kind(&self) -> AttenuatorKind {
        self.kind
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Attenuation in dB.
    pub fn attenuation(&mut self, chassis: u32, slot: u32) -> Result<f64> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:RATT?", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => "INP:ATT?".to_string(),
            AttenuatorKind::Keysight => format!("INP{slot}:ATT?"),
        };
        let value = parse_number(&command, &self.session.query_retry_refresh(&command)?)?;
        Ok(match self.kind {
            AttenuatorKind::ExfoModule => negate(value),
            _ => value,
        })
    }

    pub fn set_attenuation(&mut self, chassis: u32, slot: u32, db: f64) -> Result<()> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:RATT {db}", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => format!("INP:ATT {}", negate(db)),
            AttenuatorKind::Keysight => format!("INP{slot}:ATT {db}"),
        };
        self.session.write(&command)
    }

    /// Calibration offset in dB.
    pub fn offset(&mut self, chassis: u32, slot: u32) -> Result<f64> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:OFFS?", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => "INP:OFFS?".to_string(),
            AttenuatorKind::Keysight => format!("INP{slot}:OFFS?"),
        };
        parse_number(&command, &self.session.query_retry_refresh(&command)?)
    }

    pub fn set_offset(&mut self, chassis: u32, slot: u32, db: f64) -> Result<()> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:OFFs {db} DB", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => format!("INP:OFFS {db}"),
            AttenuatorKind::Keysight => format!("INP{slot}:OFFS {db}"),
        };
        self.session.write(&command)
    }

    fn wavelength_command(&self, chassis: u32, slot: u32) -> String {
        match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:WAV?", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => "INP:WAVE?".to_string(),
            AttenuatorKind::Keysight => format!(":INP{slot}:WAV?"),
        }
    }

    /// The 3150 module reports nanometers, everything else meters.
    fn wavelength_meters(&self, command: &str, reply: &str) -> Result<f64> {
        let value = parse_number(command, reply)?;
        Ok(match self.kind {
            AttenuatorKind::ExfoModule => nm_to_m(value),
            _ => value,
        })
    }

    /// Calibration wavelength in meters.
    ///
    /// Units sometimes return a stale, out-of-band value right after a change;
    /// those are re-queried up to twice.
    pub fn wavelength(&mut self, chassis: u32, slot: u32) -> Result<f64> {
        let command = self.wavelength_command(chassis, slot);
        let reply = self.session.query_retry_refresh(&command)?;
        let mut reading = self.wavelength_meters(&command, &reply);
        for _ in 0..WAVELENGTH_REQUERIES {
            if matches!(reading, Ok(meters) if meters <= MAX_WAVELENGTH_M) {
                break;
            }
            let reply = self.session.query(&command)?;
            reading = self.wavelength_meters(&command, &reply);
        }
        reading
    }

    pub fn set_wavelength(&mut self, chassis: u32, slot: u32, nm: f64) -> Result<()> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:WAV {nm} NM", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => format!("INP:WAVE {nm}"),
            AttenuatorKind::Keysight => format!(":INP{slot}:WAV {nm}nm"),
        };
        self.session.refresh_connection()?;
        self.session.write(&command)
    }

    /// Output power setpoint in dBm.
    pub fn power_setpoint(&mut self, chassis: u32, slot: u32) -> Result<f64> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:ATT?", lins(chassis, slot)),
            AttenuatorKind::ExfoModule => "INP:ATT?".to_string(),
            AttenuatorKind::Keysight => format!("OUTP{slot}:POW?"),
        };
        let value = parse_number(&command, &self.session.query_retry_clear(&command)?)?;
        match self.kind {
            AttenuatorKind::ExfoChassis => Ok(negate(value)),
            AttenuatorKind::ExfoModule => {
                let offset = self.offset(chassis, slot)?;
                Ok(negate(negate(value) - offset))
            }
            AttenuatorKind::Keysight => Ok(value),
        }
    }

    pub fn set_power_setpoint(&mut self, chassis: u32, slot: u32, dbm: f64) -> Result<()> {
        let command = match self.kind {
            AttenuatorKind::ExfoChassis => format!("{}:INP:ATT {}", lins(chassis, slot), negate(dbm)),
            AttenuatorKind::ExfoModule => {
                let offset = self.offset(chassis, slot)?;
                let attenuation = negate(dbm) + offset;
                format!("INP:ATT {}", negate(attenuation))
            }
            AttenuatorKind::Keysight => format!("OUTP{slot}:POW {dbm}"),
        };
        self.session.refresh_connection()?;
        self.session.write(&command)
    }

    fn require_keysight(&self, operation: &str) -> Result<()> {
        match self.kind {
            AttenuatorKind::Keysight => Ok(()),
            other => Err(Error::unsupported(operation, other)),
        }
    }

    pub fn enable(&mut self, slot: u32, channel: u32) -> Result<()> {
        self.require_keysight("enable")?;
        set_output(&mut self.session, slot, channel, true)
    }

    pub fn disable(&mut self, slot: u32, channel: u32) -> Result<()> {
        self.require_keysight("disable")?;
        set_output(&mut self.session, slot, channel, false)
    }

    pub fn state(&mut self, slot: u32, channel: u32) -> Result<OutputState> {
        self.require_keysight("state")?;
        output_state(&mut self.session, slot, channel)
    }
}
