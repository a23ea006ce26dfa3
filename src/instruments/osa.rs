//! Yokogawa optical spectrum analyzers, driven with the AQ6317 command set.

use tracing::{debug, info};

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::session::{parse_number, Session};

const LEGACY_FORMAT: &str = ":SYSTem:COMMunicate:CFORmat AQ6317";

/// Peak wavelength, peak level and SNR reported by the WDM analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WdmAnalysis {
    pub peak_wavelength: f64,
    pub peak_level: f64,
    pub snr: f64,
}

/// Side-mode suppression analysis of a single-mode laser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmsrAnalysis {
    pub peak_wavelength: f64,
    pub peak_level: f64,
    pub side_mode_wavelength: f64,
    pub side_mode_level: f64,
    pub wavelength_difference: f64,
    pub level_difference: f64,
}

/// Trace A as shown on screen: wavelength in nm against level in dBm.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OsaTrace {
    pub wavelengths: Vec<f64>,
    pub levels: Vec<f64>,
}

impl OsaTrace {
    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.wavelengths.iter().copied().zip(self.levels.iter().copied())
    }
}

/// Comma-separated numeric reply with blanks and line ends removed.
fn split_fields(reply: &str) -> Vec<String> {
    reply
        .chars()
        .filter(|c| !matches!(c, ' ' | '\r' | '\n'))
        .collect::<String>()
        .split(',')
        .map(str::to_string)
        .collect()
}

fn field(command: &str, reply: &str, fields: &[String], index: usize) -> Result<f64> {
    let value = fields.get(index).ok_or_else(|| Error::parse(command, reply))?;
    parse_number(command, value)
}

/// `LDATA`/`WDATA` replies start with the point count.
fn trace_values(command: &str, reply: &str) -> Result<Vec<f64>> {
    split_fields(reply)
        .iter()
        .skip(1)
        .filter(|v| !v.is_empty())
        .map(|v| parse_number(command, v))
        .collect()
}

pub struct Osa {
    session: Session,
}

impl Osa {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Ok(Self::new(Session::connect(address, nickname, timing)?))
    }

    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Make sure the analyzer accepts AQ6317 commands. `CFORM?` is 0 in
    /// AQ6317 mode and 1 in AQ6370 mode.
    pub fn ensure_legacy_mode(&mut self) -> Result<()> {
        self.session.write(LEGACY_FORMAT)?;
        let mode = self.session.query("CFORM?")?;
        if mode.trim_end() != "0" {
            debug!(mode = mode.trim_end(), "still in AQ6370 mode, switching again");
            self.session.write(LEGACY_FORMAT)?;
        }
        Ok(())
    }

    /// Settings file commands only exist in the AQ6370 format.
    fn settings_command(&mut self, command: String) -> Result<()> {
        self.session.write("CFORM1")?;
        self.session.write(&command)
    }

    pub fn load_setting(&mut self, name: &str) -> Result<()> {
        info!(name, "loading OSA setting");
        self.settings_command(format!("MMEMORY:LOAD:SETTING \"{name}\",INTERNAL"))
    }

    pub fn save_setting(&mut self, name: &str) -> Result<()> {
        info!(name, "saving OSA setting");
        self.settings_command(format!(":MMEMORY:STORE:SETTING \"{name}\",INTERNAL"))
    }

    pub fn delete_setting(&mut self, name: &str) -> Result<()> {
        info!(name, "deleting OSA setting");
        self.settings_command(format!(":MMEMORY:DELETE \"{name}\",INTERNAL"))
    }

    pub fn auto_sweep(&mut self) -> Result<()> {
        self.session.write("AUTO")
    }

    pub fn repeat_sweep(&mut self) -> Result<()> {
        self.session.write("RPT")
    }

    pub fn single_sweep(&mut self) -> Result<()> {
        self.session.write("SGL")
    }

    pub fn stop_sweep(&mut self) -> Result<()> {
        self.session.write("STP")
    }

    pub fn set_center(&mut self, nm: f64) -> Result<()> {
        self.session.write(&format!("CTRWL{nm}"))
    }

    pub fn set_start(&mut self, nm: f64) -> Result<()> {
        self.session.write(&format!("STAWL{nm}"))
    }

    pub fn set_stop(&mut self, nm: f64) -> Result<()> {
        self.session.write(&format!("STPWL{nm}"))
    }

    pub fn set_span(&mut self, nm: f64) -> Result<()> {
        self.session.write(&format!("SPAN{nm}"))
    }

    pub fn set_resolution(&mut self, nm: f64) -> Result<()> {
        self.session.write(&format!("RESLN{nm}"))
    }

    pub fn set_noise_bandwidth(&mut self, nm: f64) -> Result<()> {
        self.session.write(&format!("WDMNOIBW{nm}"))
    }

    pub fn center(&mut self) -> Result<f64> {
        self.session.query_f64("CTRWL?")
    }

    pub fn start(&mut self) -> Result<f64> {
        self.session.query_f64("STAWL?")
    }

    pub fn stop(&mut self) -> Result<f64> {
        self.session.query_f64("STPWL?")
    }

    pub fn span(&mut self) -> Result<f64> {
        self.session.query_f64("SPAN?")
    }

    pub fn resolution(&mut self) -> Result<f64> {
        self.session.query_f64("RESLN?")
    }

    pub fn noise_bandwidth(&mut self) -> Result<f64> {
        self.session.query_f64("WDMNOIBW?")
    }

    pub fn smsr_mode(&mut self) -> Result<()> {
        self.session.write("SMSR1")
    }

    pub fn wdm_mode(&mut self) -> Result<()> {
        self.session.write("WDMAN")
    }

    /// Switch to WDM analysis and read the first channel's results.
    pub fn wdm_analysis(&mut self) -> Result<WdmAnalysis> {
        self.wdm_mode()?;
        let command = "ANA?";
        let reply = self.session.query(command)?;
        let fields = split_fields(&reply);
        Ok(WdmAnalysis {
            peak_wavelength: field(command, &reply, &fields, 1)?,
            peak_level: field(command, &reply, &fields, 2)?,
            snr: field(command, &reply, &fields, 3)?,
        })
    }

    pub fn osnr(&mut self) -> Result<f64> {
        Ok(self.wdm_analysis()?.snr)
    }

    /// Switch to SMSR analysis and read its six results.
    pub fn smsr_analysis(&mut self) -> Result<SmsrAnalysis> {
        self.smsr_mode()?;
        let command = "ANA?";
        let reply = self.session.query(command)?;
        let fields = split_fields(&reply);
        let value = |index| field(command, &reply, &fields, index);
        Ok(SmsrAnalysis {
            peak_wavelength: value(0)?,
            peak_level: value(1)?,
            side_mode_wavelength: value(2)?,
            side_mode_level: value(3)?,
            wavelength_difference: value(4)?,
            level_difference: value(5)?,
        })
    }

    /// Fetch trace A.
    pub fn trace(&mut self) -> Result<OsaTrace> {
        let levels_reply = self.session.query("LDATA")?;
        let wavelengths_reply = self.session.query("WDATA")?;
        let levels = trace_values("LDATA", &levels_reply)?;
        let wavelengths = trace_values("WDATA", &wavelengths_reply)?;
        if levels.len() != wavelengths.len() {
            return Err(Error::parse(
                "WDATA",
                &format!(
                    "{} wavelengths for {} levels",
                    wavelengths.len(),
                    levels.len()
                ),
            ));
        }
        debug!(points = levels.len(), "trace fetched");
        Ok(OsaTrace {
            wavelengths,
            levels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn osa(mock: &MockTransport) -> Osa {
        Osa::new(Session::with_transport(
            "GPIB0::1::INSTR",
            "OSA",
            Box::new(mock.clone()),
            Timing::immediate(),
        ))
    }

    #[test]
    fn legacy_mode_rewrites_when_needed() {
        let mock = MockTransport::new();
        let mut osa = osa(&mock);
        mock.respond("CFORM?", "1\r\n");
        osa.ensure_legacy_mode().unwrap();
        assert_eq!(mock.writes().len(), 2);

        let mock = MockTransport::new();
        let mut osa = self::osa(&mock);
        mock.respond("CFORM?", "0\r\n");
        osa.ensure_legacy_mode().unwrap();
        assert_eq!(mock.writes(), vec![LEGACY_FORMAT]);
    }

    #[test]
    fn settings_switch_format_first() {
        let mock = MockTransport::new();
        let mut osa = osa(&mock);
        osa.save_setting("dwdm").unwrap();
        assert_eq!(
            mock.writes(),
            vec!["CFORM1", ":MMEMORY:STORE:SETTING \"dwdm\",INTERNAL"]
        );
    }

    #[test]
    fn wdm_fields_follow_the_channel_count() {
        let mock = MockTransport::new();
        let mut osa = osa(&mock);
        mock.respond("ANA?", " 1, 1550.116, -3.25, 38.40\r\n");
        let wdm = osa.wdm_analysis().unwrap();
        assert_eq!(wdm.peak_wavelength, 1550.116);
        assert_eq!(wdm.peak_level, -3.25);
        assert_eq!(wdm.snr, 38.4);
        assert_eq!(mock.writes(), vec!["WDMAN"]);
    }

    #[test]
    fn smsr_needs_six_values() {
        let mock = MockTransport::new();
        let mut osa = osa(&mock);
        mock.respond("ANA?", "1550.1,-2.0,1550.9,-45.0,0.8,43.0");
        let smsr = osa.smsr_analysis().unwrap();
        assert_eq!(smsr.level_difference, 43.0);
        mock.respond("ANA?", "1550.1,-2.0");
        assert!(osa.smsr_analysis().is_err());
    }

    #[test]
    fn trace_drops_point_count() {
        let mock = MockTransport::new();
        let mut osa = osa(&mock);
        mock.respond("LDATA", "3, -40.0, -3.5, -41.2");
        mock.respond("WDATA", "3, 1549.9, 1550.0, 1550.1");
        let trace = osa.trace().unwrap();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace.points().nth(1), Some((1550.0, -3.5)));
    }

    #[test]
    fn mismatched_trace_is_rejected() {
        let mock = MockTransport::new();
        let mut osa = osa(&mock);
        mock.respond("LDATA", "2,-40.0,-3.5");
        mock.respond("WDATA", "3,1549.9,1550.0,1550.1");
        assert!(matches!(osa.trace(), Err(Error::Parse { .. })));
    }
}
