//! Lightwave mainframe discovery.
//!
//! A 8163/8164/8166 mainframe reports the installed modules through `*OPT?`,
//! one comma-separated model per slot. The inventory tells the caller which
//! driver to use for each slot.

use std::fmt;

use tracing::info;

use crate::error::Result;
use crate::session::{Identity, Session};

const MULTIMETER_MODELS: &[&str] = &["8163A", "8163B"];
const MEASUREMENT_SYSTEM_MODELS: &[&str] = &["8164A", "8164B"];
const MULTICHANNEL_SYSTEM_MODELS: &[&str] = &["8166A", "8166B"];

const ATTENUATOR_MODELS: &[&str] = &["81560A", "81578A", "81576A", "81566A"];
const POWER_SENSOR_MODELS: &[&str] = &[
    "81630A", "81630B", "81632A", "81632B", "81635A", "81635B", "81536A", "81536B",
];
const TUNABLE_LASER_MODELS: &[&str] = &[
    "81600B", "81606A", "81607A", "81608A", "81609A", "81602A", "N7776C", "N7778C", "N7779C",
    "N7711A", "N7714A",
];
const REFERENCE_TRANSMITTER_MODELS: &[&str] = &["81490A", "81490B"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChassisFamily {
    Multimeter,
    MeasurementSystem,
    MultichannelSystem,
    Unknown,
}

impl ChassisFamily {
    /// Classify from the model field of `*IDN?`; older units prefix it with `HP`.
    pub fn from_model(model: &str) -> Self {
        let model = model.trim().replace("HP", "");
        let model = model.as_str();
        if MULTIMETER_MODELS.contains(&model) {
            ChassisFamily::Multimeter
        } else if MEASUREMENT_SYSTEM_MODELS.contains(&model) {
            ChassisFamily::MeasurementSystem
        } else if MULTICHANNEL_SYSTEM_MODELS.contains(&model) {
            ChassisFamily::MultichannelSystem
        } else {
            ChassisFamily::Unknown
        }
    }

    /// Number of the first slot. The 8164 counts its laser slot as 0.
    pub fn first_slot(&self) -> u32 {
        match self {
            ChassisFamily::MeasurementSystem => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for ChassisFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChassisFamily::Multimeter => "Lightwave Multimeter",
            ChassisFamily::MeasurementSystem => "Lightwave Measurement System",
            ChassisFamily::MultichannelSystem => "Lightwave Multichannel System",
            ChassisFamily::Unknown => "Unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Empty,
    Attenuator,
    PowerMeter,
    TunableLaser,
    ReferenceTransmitter,
    Unknown,
}

impl ModuleKind {
    pub fn classify(model: &str) -> Self {
        if model.is_empty() {
            ModuleKind::Empty
        } else if ATTENUATOR_MODELS.contains(&model) {
            ModuleKind::Attenuator
        } else if POWER_SENSOR_MODELS.contains(&model) {
            ModuleKind::PowerMeter
        } else if TUNABLE_LASER_MODELS.contains(&model) {
            ModuleKind::TunableLaser
        } else if REFERENCE_TRANSMITTER_MODELS.contains(&model) {
            ModuleKind::ReferenceTransmitter
        } else {
            ModuleKind::Unknown
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModuleKind::Empty => "Empty",
            ModuleKind::Attenuator => "Attenuator",
            ModuleKind::PowerMeter => "Power Meter",
            ModuleKind::TunableLaser => "Tunable Laser Source",
            ModuleKind::ReferenceTransmitter => "Reference Transmitter",
            ModuleKind::Unknown => "Unknown",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub slot: u32,
    pub model: String,
    pub kind: ModuleKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChassisInventory {
    pub family: ChassisFamily,
    pub slots: Vec<SlotEntry>,
}

/// Split an `*OPT?` reply into one model per slot, blanks for empty slots.
pub fn parse_options(reply: &str) -> Vec<String> {
    reply
        .chars()
        .filter(|c| !matches!(c, ' ' | '\n' | '\r'))
        .collect::<String>()
        .replace("HP", "")
        .split(',')
        .map(str::to_string)
        .collect()
}

impl ChassisInventory {
    pub fn from_replies(idn: &str, options: &str) -> Self {
        let family = ChassisFamily::from_model(&Identity::parse(idn).model);
        let slots = parse_options(options)
            .into_iter()
            .zip(family.first_slot()..)
            .map(|(model, slot)| SlotEntry {
                slot,
                kind: ModuleKind::classify(&model),
                model,
            })
            .collect();
        Self { family, slots }
    }

    /// Identify the mainframe and every installed module.
    pub fn discover(session: &mut Session) -> Result<Self> {
        let idn = session.idn()?;
        let options = session.slot_idns()?;
        let inventory = Self::from_replies(&idn, &options);
        info!(
            address = session.address(),
            family = %inventory.family,
            slots = inventory.slots.len(),
            "chassis identified"
        );
        Ok(inventory)
    }

    /// Slots holding a module of `kind`.
    pub fn slots_of(&self, kind: ModuleKind) -> impl Iterator<Item = u32> + '_ {
        self.slots
            .iter()
            .filter(move |entry| entry.kind == kind)
            .map(|entry| entry.slot)
    }
}

impl fmt::Display for ChassisInventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.family)?;
        for entry in &self.slots {
            writeln!(f, "Slot {}: {} {}", entry.slot, entry.kind, entry.model)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_ignore_hp_prefix() {
        assert_eq!(ChassisFamily::from_model("HP8163A"), ChassisFamily::Multimeter);
        assert_eq!(
            ChassisFamily::from_model(" 8164B"),
            ChassisFamily::MeasurementSystem
        );
        assert_eq!(
            ChassisFamily::from_model("8166A"),
            ChassisFamily::MultichannelSystem
        );
        assert_eq!(ChassisFamily::from_model("E3631A"), ChassisFamily::Unknown);
    }

    #[test]
    fn options_are_split_per_slot() {
        assert_eq!(
            parse_options("HP 81635A, 81560A,,N7714A\n"),
            vec!["81635A", "81560A", "", "N7714A"]
        );
    }

    #[test]
    fn measurement_system_counts_from_zero() {
        let inv = ChassisInventory::from_replies(
            "Agilent Technologies,8164B,DE1,V5",
            "81600B, 81635A, , 81490A, 81999Z",
        );
        assert_eq!(inv.family, ChassisFamily::MeasurementSystem);
        let kinds: Vec<_> = inv.slots.iter().map(|s| (s.slot, s.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (0, ModuleKind::TunableLaser),
                (1, ModuleKind::PowerMeter),
                (2, ModuleKind::Empty),
                (3, ModuleKind::ReferenceTransmitter),
                (4, ModuleKind::Unknown),
            ]
        );
    }

    #[test]
    fn other_mainframes_count_from_one() {
        let inv = ChassisInventory::from_replies("HP,HP8163A,1,2", "81560A,81632B");
        assert_eq!(inv.slots_of(ModuleKind::Attenuator).collect::<Vec<_>>(), vec![1]);
        assert_eq!(inv.slots_of(ModuleKind::PowerMeter).collect::<Vec<_>>(), vec![2]);
    }
}
