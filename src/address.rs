//! VISA resource strings and slot entries.
//!
//! GPIB Format:    GPIB0::21::INSTR or GPIB0::21::2::INSTR
//! Socket Format:  TCPIP0::192.168.0.10::5025::SOCKET

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static GPIB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"GPIB\d+::\d+::INSTR").expect("GPIB pattern is a valid regex")
});

/// Default port of a raw SCPI socket.
pub const SCPI_SOCKET_PORT: u16 = 5025;

/// A parsed VISA resource string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// `GPIB<board>::<primary>[::<secondary>]::INSTR`
    Gpib {
        board: u16,
        primary: u16,
        secondary: Option<u16>,
    },
    /// `TCPIP<board>::<host>::<port>::SOCKET`, a raw SCPI socket.
    Socket { board: u16, host: String, port: u16 },
    /// `TCPIP<board>::<host>[::<device>]::INSTR`, VXI-11 or HiSLIP.
    Lan {
        board: u16,
        host: String,
        device: Option<String>,
    },
    /// Any other VISA resource (USB, serial), passed through untouched.
    Visa(String),
}

impl ResourceAddress {
    /// True when the resource can only be reached through a VISA library.
    pub fn needs_visa(&self) -> bool {
        !matches!(self, ResourceAddress::Socket { .. })
    }
}

fn board_number(prefix: &str, field: &str, original: &str) -> Result<u16> {
    let digits = &field[prefix.len()..];
    if digits.is_empty() {
        return Ok(0);
    }
    digits
        .parse()
        .map_err(|_| Error::InvalidAddress(original.to_string()))
}

impl FromStr for ResourceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let invalid = || Error::InvalidAddress(trimmed.to_string());
        let parts: Vec<&str> = trimmed.split("::").collect();
        let interface = parts.first().map(|p| p.to_ascii_uppercase()).unwrap_or_default();
        let suffix = parts.last().map(|p| p.to_ascii_uppercase()).unwrap_or_default();

        if interface.starts_with("GPIB") {
            if !(3..=4).contains(&parts.len()) || suffix != "INSTR" {
                return Err(invalid());
            }
            let board = board_number("GPIB", &interface, trimmed)?;
            let primary = parts[1].parse().map_err(|_| invalid())?;
            let secondary = match parts.len() {
                4 => Some(parts[2].parse().map_err(|_| invalid())?),
                _ => None,
            };
            return Ok(ResourceAddress::Gpib {
                board,
                primary,
                secondary,
            });
        }

        if interface.starts_with("TCPIP") {
            let board = board_number("TCPIP", &interface, trimmed)?;
            let host = parts.get(1).filter(|h| !h.is_empty()).ok_or_else(invalid)?;
            return match (parts.len(), suffix.as_str()) {
                (4, "SOCKET") => {
                    let port = parts[2].parse().map_err(|_| invalid())?;
                    Ok(ResourceAddress::Socket {
                        board,
                        host: host.to_string(),
                        port,
                    })
                }
                (3, "INSTR") => Ok(ResourceAddress::Lan {
                    board,
                    host: host.to_string(),
                    device: None,
                }),
                (4, "INSTR") => Ok(ResourceAddress::Lan {
                    board,
                    host: host.to_string(),
                    device: Some(parts[2].to_string()),
                }),
                _ => Err(invalid()),
            };
        }

        if parts.len() >= 2 && suffix == "INSTR" {
            return Ok(ResourceAddress::Visa(trimmed.to_string()));
        }

        Err(invalid())
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::Gpib {
                board,
                primary,
                secondary: Some(secondary),
            } => write!(f, "GPIB{board}::{primary}::{secondary}::INSTR"),
            ResourceAddress::Gpib {
                board,
                primary,
                secondary: None,
            } => write!(f, "GPIB{board}::{primary}::INSTR"),
            ResourceAddress::Socket { board, host, port } => {
                write!(f, "TCPIP{board}::{host}::{port}::SOCKET")
            }
            ResourceAddress::Lan {
                board,
                host,
                device: Some(device),
            } => write!(f, "TCPIP{board}::{host}::{device}::INSTR"),
            ResourceAddress::Lan {
                board,
                host,
                device: None,
            } => write!(f, "TCPIP{board}::{host}::INSTR"),
            ResourceAddress::Visa(raw) => f.write_str(raw),
        }
    }
}

/// Loose GPIB check used by the front panels: the pattern may appear anywhere.
pub fn is_valid_gpib(address: &str) -> bool {
    GPIB_RE.is_match(address)
}

/// Parse a slot entry, which must be a non-negative integer.
pub fn parse_slot(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    trimmed
        .parse::<u32>()
        .map_err(|_| Error::InvalidArgument(format!("Invalid slot entry '{trimmed}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gpib() {
        let addr: ResourceAddress = "GPIB2::21::INSTR".parse().unwrap();
        assert_eq!(
            addr,
            ResourceAddress::Gpib {
                board: 2,
                primary: 21,
                secondary: None
            }
        );
        assert!(addr.needs_visa());
        assert_eq!(addr.to_string(), "GPIB2::21::INSTR");
    }

    #[test]
    fn parses_gpib_secondary_address() {
        let addr: ResourceAddress = "GPIB0::7::2::INSTR".parse().unwrap();
        assert_eq!(
            addr,
            ResourceAddress::Gpib {
                board: 0,
                primary: 7,
                secondary: Some(2)
            }
        );
        assert_eq!(addr.to_string(), "GPIB0::7::2::INSTR");
        assert!("GPIB0::7::x::INSTR".parse::<ResourceAddress>().is_err());
        assert!("GPIB0::7::2::3::INSTR".parse::<ResourceAddress>().is_err());
    }

    #[test]
    fn parses_socket() {
        let addr: ResourceAddress = "TCPIP0::172.20.240.110::5025::SOCKET".parse().unwrap();
        assert_eq!(
            addr,
            ResourceAddress::Socket {
                board: 0,
                host: "172.20.240.110".into(),
                port: SCPI_SOCKET_PORT
            }
        );
        assert!(!addr.needs_visa());
    }

    #[test]
    fn parses_lan_instr() {
        let addr: ResourceAddress = "TCPIP0::192.168.3.242::hislip0::INSTR".parse().unwrap();
        assert_eq!(
            addr,
            ResourceAddress::Lan {
                board: 0,
                host: "192.168.3.242".into(),
                device: Some("hislip0".into())
            }
        );
        let plain: ResourceAddress = "TCPIP::10.0.0.5::INSTR".parse().unwrap();
        assert_eq!(plain.to_string(), "TCPIP0::10.0.0.5::INSTR");
    }

    #[test]
    fn keeps_usb_resources() {
        let raw = "USB::4883::32847::M01053290::0::INSTR";
        let addr: ResourceAddress = raw.parse().unwrap();
        assert_eq!(addr, ResourceAddress::Visa(raw.into()));
    }

    #[test]
    fn rejects_garbage() {
        assert!("GPIB0::x::INSTR".parse::<ResourceAddress>().is_err());
        assert!("TCPIP0::host::5025".parse::<ResourceAddress>().is_err());
        assert!("TCPIP0::host::port::SOCKET".parse::<ResourceAddress>().is_err());
        assert!("hello".parse::<ResourceAddress>().is_err());
    }

    #[test]
    fn gpib_pattern_matches_anywhere() {
        assert!(is_valid_gpib("GPIB0::7::INSTR"));
        assert!(is_valid_gpib("  GPIB12::3::INSTR  "));
        assert!(!is_valid_gpib("GPIB0::INSTR"));
        assert!(!is_valid_gpib("TCPIP0::1.2.3.4::5025::SOCKET"));
    }

    #[test]
    fn slot_must_be_non_negative() {
        assert_eq!(parse_slot("2").unwrap(), 2);
        assert_eq!(parse_slot(" 0 ").unwrap(), 0);
        assert!(parse_slot("-1").is_err());
        assert!(parse_slot("one").is_err());
    }
}
