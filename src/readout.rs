//! Front-panel style readouts.
//!
//! Each readout polls one module and keeps what a bench operator would see:
//! values rounded for display, absent when the module gave nothing usable.
//! Absent values render as the dashed placeholders from [`crate::units`].

use std::fmt;

use tracing::warn;

use crate::error::Result;
use crate::instruments::{Attenuator, OutputState, PowerMeter, ReferenceTransmitter, TunableLaser};
use crate::units::{
    format_or, m_to_nm, round_to, scale_watts, PowerUnit, WattScale, MAX_PLAUSIBLE_POWER,
    MAX_PLAUSIBLE_WAVELENGTH_NM, POWER_SENTINEL, STATE_SENTINEL, UNIT_SENTINEL,
    WAVELENGTH_SENTINEL,
};

/// Power meter modules expose two sensor heads.
pub const POWER_METER_CHANNELS: [u32; 2] = [1, 2];

fn plausible_wavelength(nm: f64) -> Option<f64> {
    (nm <= MAX_PLAUSIBLE_WAVELENGTH_NM).then(|| round_to(nm, 3))
}

fn clear_after_failure(meter: &mut PowerMeter, slot: u32, channel: u32) {
    if let Err(e) = meter.session_mut().clear() {
        warn!(slot, channel, error = %e, "clear after failed read also failed");
    }
}

/// One sensor head of a power meter.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelReadout {
    pub channel: u32,
    pub wavelength_nm: Option<f64>,
    pub power: Option<f64>,
    pub unit: Option<PowerUnit>,
    /// Display prefix when the unit is watts.
    pub scale: Option<WattScale>,
}

impl ChannelReadout {
    pub fn read(meter: &mut PowerMeter, slot: u32, channel: u32) -> Self {
        let wavelength_nm = match meter.wavelength(slot, channel) {
            Ok(meters) => plausible_wavelength(m_to_nm(meters)),
            Err(e) => {
                warn!(slot, channel, error = %e, "wavelength unreadable");
                clear_after_failure(meter, slot, channel);
                None
            }
        };
        let raw_power = match meter.power(slot, channel) {
            Ok(value) if value <= MAX_PLAUSIBLE_POWER => Some(value),
            Ok(_) => None,
            Err(e) => {
                warn!(slot, channel, error = %e, "power unreadable");
                clear_after_failure(meter, slot, channel);
                None
            }
        };
        let unit = meter.unit(slot, channel);

        let (power, scale) = match (raw_power, unit) {
            (Some(watts), Some(PowerUnit::Watt)) => {
                let (value, scale) = scale_watts(watts);
                (Some(round_to(value, 4)), Some(scale))
            }
            (Some(value), _) => (Some(round_to(value, 3)), None),
            (None, _) => (None, None),
        };

        Self {
            channel,
            wavelength_nm,
            power,
            unit,
            scale,
        }
    }

    pub fn unit_label(&self) -> &'static str {
        match (self.unit, self.scale) {
            (Some(PowerUnit::Watt), Some(scale)) => scale.symbol(),
            (Some(unit), _) => unit.symbol(),
            (None, _) => UNIT_SENTINEL,
        }
    }
}

impl fmt::Display for ChannelReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let places = if self.scale.is_some() { 4 } else { 3 };
        write!(
            f,
            "Channel {}: {} {}  {} nm",
            self.channel,
            format_or(self.power, places, POWER_SENTINEL),
            self.unit_label(),
            format_or(self.wavelength_nm, 3, WAVELENGTH_SENTINEL),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerMeterReadout {
    pub slot: u32,
    pub channels: Vec<ChannelReadout>,
}

impl PowerMeterReadout {
    /// Read both heads. Failures never propagate; they show as placeholders.
    pub fn read(meter: &mut PowerMeter, slot: u32) -> Self {
        let channels = POWER_METER_CHANNELS
            .iter()
            .map(|&channel| ChannelReadout::read(meter, slot, channel))
            .collect();
        Self { slot, channels }
    }
}

impl fmt::Display for PowerMeterReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Power meter, slot {}", self.slot)?;
        for channel in &self.channels {
            writeln!(f, "  {channel}")?;
        }
        Ok(())
    }
}

/// All four values or none of them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttenuatorReadout {
    pub attenuation: Option<f64>,
    pub wavelength_nm: Option<f64>,
    pub offset: Option<f64>,
    pub power_setpoint: Option<f64>,
}

impl AttenuatorReadout {
    pub fn read(att: &mut Attenuator, chassis: u32, slot: u32) -> Self {
        let values = (|| -> Result<Self> {
            Ok(Self {
                attenuation: Some(round_to(att.attenuation(chassis, slot)?, 3)),
                wavelength_nm: Some(round_to(m_to_nm(att.wavelength(chassis, slot)?), 3)),
                offset: Some(round_to(att.offset(chassis, slot)?, 3)),
                power_setpoint: Some(round_to(att.power_setpoint(chassis, slot)?, 3)),
            })
        })();
        values.unwrap_or_else(|e| {
            warn!(chassis, slot, error = %e, "attenuator unreadable");
            Self::default()
        })
    }
}

impl fmt::Display for AttenuatorReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Attenuation: {} dB",
            format_or(self.attenuation, 3, POWER_SENTINEL)
        )?;
        writeln!(
            f,
            "Wavelength:  {} nm",
            format_or(self.wavelength_nm, 3, WAVELENGTH_SENTINEL)
        )?;
        writeln!(
            f,
            "Power:       {} dBm",
            format_or(self.power_setpoint, 3, POWER_SENTINEL)
        )?;
        writeln!(f, "Offset:      {} dB", format_or(self.offset, 3, POWER_SENTINEL))
    }
}

fn state_label(state: Option<OutputState>) -> String {
    state.map_or_else(|| STATE_SENTINEL.to_string(), |s| s.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserReadout {
    pub wavelength_nm: Option<f64>,
    pub power_dbm: Option<f64>,
    pub state: Option<OutputState>,
}

impl LaserReadout {
    pub fn read(laser: &mut TunableLaser, slot: u32, channel: u32) -> Self {
        Self {
            wavelength_nm: laser
                .wavelength(slot, channel)
                .map(|m| round_to(m_to_nm(m), 4))
                .ok(),
            power_dbm: laser.power(slot, channel).map(|p| round_to(p, 3)).ok(),
            state: laser.state(slot, channel).ok(),
        }
    }
}

impl fmt::Display for LaserReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Wavelength: {} nm",
            format_or(self.wavelength_nm, 4, WAVELENGTH_SENTINEL)
        )?;
        writeln!(
            f,
            "Power:      {} dBm",
            format_or(self.power_dbm, 3, POWER_SENTINEL)
        )?;
        writeln!(f, "State:      {}", state_label(self.state))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransmitterReadout {
    pub wavelength_nm: Option<f64>,
    pub state: Option<OutputState>,
}

impl TransmitterReadout {
    pub fn read(tx: &mut ReferenceTransmitter, slot: u32, channel: u32) -> Self {
        Self {
            wavelength_nm: tx
                .wavelength(slot, channel)
                .map(|m| round_to(m_to_nm(m), 1))
                .ok(),
            state: tx.state(slot, channel).ok(),
        }
    }
}

impl fmt::Display for TransmitterReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Wavelength: {} nm",
            format_or(self.wavelength_nm, 1, WAVELENGTH_SENTINEL)
        )?;
        writeln!(f, "State:      {}", state_label(self.state))
    }
}
