//! Configuration loaded with Figment.
//!
//! Sources, later ones winning:
//! 1. `optilab.toml` (or the file given with `--config`)
//! 2. Environment variables prefixed with `OPTILAB_`, `__` separating levels
//!
//! ```toml
//! log_level = "debug"
//!
//! [timing]
//! io_timeout = "5s"
//! clear_settle = "500ms"
//!
//! [instruments.osa1]
//! address = "GPIB0::1::INSTR"
//! kind = "osa"
//! nickname = "Bench OSA"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::address::ResourceAddress;
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "optilab.toml";
pub const ENV_PREFIX: &str = "OPTILAB_";

/// Delays the instruments need between commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Read/write timeout of the link.
    #[serde(with = "humantime_serde")]
    pub io_timeout: Duration,
    /// Pause after a device clear.
    #[serde(with = "humantime_serde")]
    pub clear_settle: Duration,
    /// Pause after an oscilloscope autoscale.
    #[serde(with = "humantime_serde")]
    pub autoscale_settle: Duration,
    /// Pause after switching oscilloscope mode.
    #[serde(with = "humantime_serde")]
    pub mode_settle: Duration,
    /// Pause after enabling pattern lock.
    #[serde(with = "humantime_serde")]
    pub pattern_lock_settle: Duration,
    /// Pause after recalling a BERT workspace.
    #[serde(with = "humantime_serde")]
    pub recall_settle: Duration,
    /// Interval between acquisition-count polls.
    #[serde(with = "humantime_serde")]
    pub acquisition_poll: Duration,
    /// Give up waiting for a stable acquisition after this many polls.
    pub acquisition_max_polls: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(5),
            clear_settle: Duration::from_millis(500),
            autoscale_settle: Duration::from_secs(5),
            mode_settle: Duration::from_secs(3),
            pattern_lock_settle: Duration::from_secs(5),
            recall_settle: Duration::from_secs(5),
            acquisition_poll: Duration::from_secs(5),
            acquisition_max_polls: 120,
        }
    }
}

impl Timing {
    /// No settle delays at all, for scripted transports.
    pub fn immediate() -> Self {
        Self {
            io_timeout: Duration::from_millis(100),
            clear_settle: Duration::ZERO,
            autoscale_settle: Duration::ZERO,
            mode_settle: Duration::ZERO,
            pattern_lock_settle: Duration::ZERO,
            recall_settle: Duration::ZERO,
            acquisition_poll: Duration::ZERO,
            acquisition_max_polls: 10,
        }
    }
}

/// Instrument family an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Chassis,
    Attenuator,
    PowerMeter,
    TunableLaser,
    ReferenceTransmitter,
    Osnr,
    Osa,
    Oscilloscope,
    Switch,
    Counter,
    Bert,
}

impl InstrumentKind {
    /// Families that sit in a Lightwave or EXFO mainframe slot.
    pub fn is_module(self) -> bool {
        matches!(
            self,
            InstrumentKind::Attenuator
                | InstrumentKind::PowerMeter
                | InstrumentKind::TunableLaser
                | InstrumentKind::ReferenceTransmitter
        )
    }

    /// Whether an entry of this kind can serve a command aimed at `wanted`.
    ///
    /// A mainframe entry serves its modules and a module entry serves the
    /// mainframe it sits in, since both share one address.
    pub fn serves(self, wanted: InstrumentKind) -> bool {
        self == wanted
            || (self == InstrumentKind::Chassis && wanted.is_module())
            || (wanted == InstrumentKind::Chassis && self.is_module())
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstrumentKind::Chassis => "chassis",
            InstrumentKind::Attenuator => "attenuator",
            InstrumentKind::PowerMeter => "power_meter",
            InstrumentKind::TunableLaser => "tunable_laser",
            InstrumentKind::ReferenceTransmitter => "reference_transmitter",
            InstrumentKind::Osnr => "osnr",
            InstrumentKind::Osa => "osa",
            InstrumentKind::Oscilloscope => "oscilloscope",
            InstrumentKind::Switch => "switch",
            InstrumentKind::Counter => "counter",
            InstrumentKind::Bert => "bert",
        })
    }
}

/// A named instrument on the bench.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentEntry {
    /// VISA resource string.
    pub address: String,
    pub kind: InstrumentKind,
    #[serde(default)]
    pub nickname: Option<String>,
    /// EXFO chassis number.
    #[serde(default)]
    pub chassis: Option<u32>,
    #[serde(default)]
    pub slot: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    pub timing: Timing,
    pub instruments: BTreeMap<String, InstrumentEntry>,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            timing: Timing::default(),
            instruments: BTreeMap::new(),
        }
    }
}

impl LabConfig {
    /// Load `optilab.toml` from the working directory plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from a specific file. A missing file leaves the defaults in place.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: LabConfig = Figment::from(figment::providers::Serialized::defaults(
            LabConfig::default(),
        ))
        .merge(Toml::file(path.as_ref()))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(Error::Validation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.timing.io_timeout.is_zero() {
            return Err(Error::Validation("io_timeout must be positive".to_string()));
        }

        for (name, entry) in &self.instruments {
            entry.address.parse::<ResourceAddress>().map_err(|_| {
                Error::Validation(format!(
                    "Instrument '{name}' has an invalid address '{}'",
                    entry.address
                ))
            })?;
        }

        Ok(())
    }

    pub fn instrument(&self, name: &str) -> Result<&InstrumentEntry> {
        self.instruments
            .get(name)
            .ok_or_else(|| Error::Validation(format!("Instrument '{name}' not found in config")))
    }

    /// Look up `name` and check it can serve a command for `wanted`.
    pub fn instrument_for(
        &self,
        name: &str,
        wanted: Option<InstrumentKind>,
    ) -> Result<&InstrumentEntry> {
        let entry = self.instrument(name)?;
        match wanted {
            Some(wanted) if !entry.kind.serves(wanted) => Err(Error::Validation(format!(
                "Instrument '{name}' is configured as {}, not {wanted}",
                entry.kind
            ))),
            _ => Ok(entry),
        }
    }
}
