//! Unit conversions and front-panel placeholders.

use std::fmt;

/// Placeholder shown for a power or attenuation that could not be read.
pub const POWER_SENTINEL: &str = "--.---";
/// Placeholder shown for a wavelength that could not be read.
pub const WAVELENGTH_SENTINEL: &str = "----.---";
/// Placeholder shown for an output state that could not be read.
pub const STATE_SENTINEL: &str = "-----";
/// Placeholder shown for a power unit the meter did not report.
pub const UNIT_SENTINEL: &str = "---";

/// Wavelength readings above this are treated as garbage.
pub const MAX_PLAUSIBLE_WAVELENGTH_NM: f64 = 2000.0;
/// Power readings above this are the meter's "no reading" value.
pub const MAX_PLAUSIBLE_POWER: f64 = 120.0;

const NM_PER_M: f64 = 1e9;

pub fn m_to_nm(meters: f64) -> f64 {
    meters * NM_PER_M
}

pub fn nm_to_m(nanometers: f64) -> f64 {
    nanometers / NM_PER_M
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// Power unit selected on a Lightwave power sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PowerUnit {
    Dbm,
    Watt,
}

impl PowerUnit {
    pub fn to_command_value(&self) -> &'static str {
        match self {
            PowerUnit::Dbm => "0",
            PowerUnit::Watt => "1",
        }
    }

    /// Map the numeric code returned by `POW:UNIT?`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PowerUnit::Dbm),
            1 => Some(PowerUnit::Watt),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            PowerUnit::Dbm => "dBm",
            PowerUnit::Watt => "W",
        }
    }
}

impl fmt::Display for PowerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Display prefix for a reading in watts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WattScale {
    W,
    MilliW,
    MicroW,
    NanoW,
}

impl WattScale {
    pub fn symbol(&self) -> &'static str {
        match self {
            WattScale::W => "W",
            WattScale::MilliW => "mW",
            WattScale::MicroW => "uW",
            WattScale::NanoW => "nW",
        }
    }

    fn smaller(self) -> Option<Self> {
        match self {
            WattScale::W => Some(WattScale::MilliW),
            WattScale::MilliW => Some(WattScale::MicroW),
            WattScale::MicroW => Some(WattScale::NanoW),
            WattScale::NanoW => None,
        }
    }
}

impl fmt::Display for WattScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Step a watt reading down the W, mW, uW, nW ladder while it is below 0.01.
pub fn scale_watts(watts: f64) -> (f64, WattScale) {
    let mut value = watts;
    let mut scale = WattScale::W;
    while value.abs() < 0.01 {
        match scale.smaller() {
            Some(next) => {
                value *= 1000.0;
                scale = next;
            }
            None => break,
        }
    }
    (value, scale)
}

/// Format `value` with `places` decimals, or the sentinel when absent.
pub fn format_or(value: Option<f64>, places: usize, sentinel: &str) -> String {
    match value {
        Some(v) => format!("{v:.places$}"),
        None => sentinel.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wavelength_conversions() {
        assert!((m_to_nm(1.55e-6) - 1550.0).abs() < 1e-9);
        assert!((nm_to_m(1310.0) - 1.31e-6).abs() < 1e-18);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1550.12345, 3), 1550.123);
        assert_eq!(round_to(-3.14159, 2), -3.14);
    }

    #[test]
    fn unit_codes() {
        assert_eq!(PowerUnit::from_code(0), Some(PowerUnit::Dbm));
        assert_eq!(PowerUnit::from_code(1), Some(PowerUnit::Watt));
        assert_eq!(PowerUnit::from_code(7), None);
        assert_eq!(PowerUnit::Watt.to_command_value(), "1");
    }

    #[test]
    fn watt_ladder_stops_at_first_readable_scale() {
        let (v, s) = scale_watts(0.5);
        assert_eq!((v, s), (0.5, WattScale::W));

        let (v, s) = scale_watts(0.002);
        assert_eq!(s, WattScale::MilliW);
        assert!((v - 2.0).abs() < 1e-9);

        let (v, s) = scale_watts(-3.2e-6);
        assert_eq!(s, WattScale::MicroW);
        assert!((v + 3.2).abs() < 1e-9);
    }

    #[test]
    fn watt_ladder_bottoms_out_at_nanowatts() {
        let (v, s) = scale_watts(1e-12);
        assert_eq!(s, WattScale::NanoW);
        assert!((v - 0.001).abs() < 1e-12);
        assert_eq!(scale_watts(0.0), (0.0, WattScale::NanoW));
    }

    #[test]
    fn sentinel_formatting() {
        assert_eq!(format_or(Some(-12.3456), 3, POWER_SENTINEL), "-12.346");
        assert_eq!(format_or(None, 3, WAVELENGTH_SENTINEL), "----.---");
    }
}
