//! Keysight DCA / Infiniium sampling oscilloscopes.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use super::on_off;
use crate::config::Timing;
use crate::error::{Error, Result};
use crate::session::Session;

/// Line rates the channel filters and clock recovery accept, in Hz.
pub const FILTER_RATES: [f64; 5] = [1.25e9, 1.03125e10, 2.578125e10, 2.65625e10, 5.3125e10];

/// Clock recovery module used when none is given.
pub const DEFAULT_CDR_CHANNEL: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    Oscilloscope,
    Jitter,
    Tdr,
    Eye,
}

impl ScopeMode {
    fn mnemonic(&self) -> &'static str {
        match self {
            ScopeMode::Oscilloscope => "OSCilloscope",
            ScopeMode::Jitter => "JITTer",
            ScopeMode::Tdr => "TDR",
            ScopeMode::Eye => "EYE",
        }
    }
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeMode::Oscilloscope => "oscilloscope",
            ScopeMode::Jitter => "jitter",
            ScopeMode::Tdr => "tdr",
            ScopeMode::Eye => "eye",
        })
    }
}

impl FromStr for ScopeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "oscilloscope" | "osc" => Ok(ScopeMode::Oscilloscope),
            "jitter" => Ok(ScopeMode::Jitter),
            "tdr" => Ok(ScopeMode::Tdr),
            "eye" => Ok(ScopeMode::Eye),
            other => Err(Error::InvalidArgument(format!(
                "unknown oscilloscope mode '{other}'"
            ))),
        }
    }
}

/// Total and data-dependent jitter, in unit intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JitterMeasurement {
    pub total: f64,
    pub data_dependent: f64,
}

/// Mean rise and fall times, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeTimes {
    pub rise: f64,
    pub fall: f64,
}

pub struct Oscilloscope {
    session: Session,
}

impl Oscilloscope {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Ok(Self::new(Session::connect(address, nickname, timing)?))
    }

    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn autoscale(&mut self) -> Result<()> {
        self.session.write(":SYSTem:AUToscale")?;
        self.session.settle(self.session.timing().autoscale_settle);
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        self.session.write(":ACQuire:RUN")
    }

    pub fn stop(&mut self) -> Result<()> {
        self.session.write(":ACQuire:STOP")
    }

    pub fn set_mode(&mut self, mode: ScopeMode) -> Result<()> {
        info!(%mode, "switching oscilloscope mode");
        self.session
            .write(&format!(":SYSTem:MODE {}", mode.mnemonic()))?;
        self.session.settle(self.session.timing().mode_settle);
        Ok(())
    }

    pub fn enable_pattern_lock(&mut self) -> Result<()> {
        self.session.write(":TRIGger:PLOCk ON")?;
        self.session
            .settle(self.session.timing().pattern_lock_settle);
        Ok(())
    }

    pub fn disable_pattern_lock(&mut self) -> Result<()> {
        self.session.write(":TRIGger:PLOCk OFF")
    }

    pub fn set_filter(&mut self, channel: u32, on: bool) -> Result<()> {
        self.session
            .write(&format!(":CHAN{channel}A:FILTer {}", on_off(on)))
    }

    /// Select the filter for a line rate; see [`FILTER_RATES`].
    pub fn set_filter_rate(&mut self, channel: u32, rate: f64) -> Result<()> {
        self.session
            .write(&format!(":CHAN{channel}A:FSELect:RATe {rate:E}"))
    }

    pub fn set_input_display(&mut self, channel: u32, on: bool) -> Result<()> {
        self.session
            .write(&format!(":CHAN{channel}A:DISlay {}", on_off(on)))
    }

    pub fn cdr_relock(&mut self, channel: u32) -> Result<()> {
        self.session.write(&format!(":CRECovery{channel}:RELock"))
    }

    /// Set the recovered clock rate, then relock on it.
    pub fn cdr_lock(&mut self, channel: u32, rate: f64) -> Result<()> {
        self.session
            .write(&format!(":CRECovery{channel}:CRATe {rate:E}"))?;
        self.cdr_relock(channel)
    }

    /// Data-to-clock ratio of a clock recovery module.
    pub fn cdr_ratio(&mut self, channel: u32) -> Result<String> {
        let reply = self
            .session
            .query(&format!(":CRECovery{channel}:ODRatio?"))?;
        Ok(reply.trim().to_string())
    }

    pub fn measure_jitter(&mut self) -> Result<JitterMeasurement> {
        self.session.write(":MEASure:JITTer:DEFine:UNITs UINTerval")?;
        let total = self.session.query_f64(":MEASure:JITTer:TJ?")?;
        let data_dependent = self.session.query_f64(":MEASure:JITTer:DDJ?")?;
        Ok(JitterMeasurement {
            total,
            data_dependent,
        })
    }

    /// Add rise and fall time measurements to the screen.
    pub fn show_edge_times(&mut self) -> Result<()> {
        self.session.write(":MEASure:OSCilloscope:FALLtime")?;
        self.session.write(":MEASure:OSCilloscope:RISetime")
    }

    pub fn edge_times(&mut self) -> Result<EdgeTimes> {
        let fall = self
            .session
            .query_f64(":MEASure:OSCilloscope:FALLtime:Mean?")?;
        let rise = self
            .session
            .query_f64(":MEASure:OSCilloscope:RISetime:Mean?")?;
        Ok(EdgeTimes { rise, fall })
    }

    /// Acquisitions accumulated by the limit test.
    pub fn acquisition_count(&mut self) -> Result<f64> {
        self.session.query_f64(":MEASure:LTESt:ACQuire:COUNt?")
    }

    /// Block until two counts taken one poll interval apart agree.
    pub fn wait_for_acquisition(&mut self) -> Result<f64> {
        let poll = self.session.timing().acquisition_poll;
        let max_polls = self.session.timing().acquisition_max_polls;
        for attempt in 1..=max_polls {
            let first = self.acquisition_count()?;
            self.session.settle(poll);
            let second = self.acquisition_count()?;
            self.session.settle(poll);
            debug!(attempt, first, second, "acquisition count");
            if first == second {
                return Ok(second);
            }
        }
        Err(Error::Timeout(format!(
            "acquisition count still changing after {max_polls} polls"
        )))
    }

    pub fn mask_margin(&mut self) -> Result<f64> {
        self.session.query_f64("MEAS:MTES:MARG?")
    }

    pub fn extinction_ratio(&mut self) -> Result<f64> {
        self.session.query_f64(":MEASure:CGRade:ERATio?")
    }

    pub fn crossing(&mut self) -> Result<f64> {
        self.session.query_f64(":MEASure:CGRade:CROSsing?")
    }

    pub fn tdec(&mut self) -> Result<f64> {
        self.session.query_f64(":MEASure:CGRade:TDEc?")
    }

    pub fn tdecq(&mut self) -> Result<f64> {
        self.session.query_f64(":MEASure:EYE:TDEQ?")
    }

    /// Outer extinction ratio of a PAM4 eye.
    pub fn oer(&mut self) -> Result<f64> {
        self.session.query_f64(":MEASure:EYE:OER?")
    }

    pub fn set_function_display(&mut self, function: u32, on: bool) -> Result<()> {
        self.session
            .write(&format!(":FUNC{function}:DISPlay {}", on_off(on)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Exchange, MockTransport};

    fn scope(mock: &MockTransport) -> Oscilloscope {
        Oscilloscope::new(Session::with_transport(
            "GPIB0::7::INSTR",
            "DCA",
            Box::new(mock.clone()),
            Timing::immediate(),
        ))
    }

    #[test]
    fn mode_mnemonics() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        dca.set_mode(ScopeMode::Jitter).unwrap();
        dca.set_mode("eye".parse().unwrap()).unwrap();
        assert_eq!(mock.writes(), vec![":SYSTem:MODE JITTer", ":SYSTem:MODE EYE"]);
        assert!("spectrum".parse::<ScopeMode>().is_err());
    }

    #[test]
    fn filter_rate_uses_scientific_notation() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        dca.set_filter_rate(1, FILTER_RATES[4]).unwrap();
        dca.set_filter_rate(3, FILTER_RATES[0]).unwrap();
        assert_eq!(
            mock.writes(),
            vec![":CHAN1A:FSELect:RATe 5.3125E10", ":CHAN3A:FSELect:RATe 1.25E9"]
        );
    }

    #[test]
    fn cdr_lock_relocks_same_channel() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        dca.cdr_lock(5, FILTER_RATES[2]).unwrap();
        assert_eq!(
            mock.writes(),
            vec![":CRECovery5:CRATe 2.578125E10", ":CRECovery5:RELock"]
        );
    }

    #[test]
    fn acquisition_wait_stops_when_stable() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        let count = ":MEASure:LTESt:ACQuire:COUNt?";
        mock.respond(count, "10").respond(count, "20").respond(count, "20");
        assert_eq!(dca.wait_for_acquisition().unwrap(), 20.0);
        assert_eq!(mock.count(&Exchange::Query(count.into())), 4);
    }

    #[test]
    fn acquisition_wait_is_bounded() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        let count = ":MEASure:LTESt:ACQuire:COUNt?";
        for n in 0..40 {
            mock.respond(count, &n.to_string());
        }
        assert!(matches!(dca.wait_for_acquisition(), Err(Error::Timeout(_))));
    }

    #[test]
    fn jitter_sets_unit_interval_first() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        mock.respond(":MEASure:JITTer:TJ?", "0.25")
            .respond(":MEASure:JITTer:DDJ?", "0.05");
        let jitter = dca.measure_jitter().unwrap();
        assert_eq!(jitter.total, 0.25);
        assert_eq!(mock.writes(), vec![":MEASure:JITTer:DEFine:UNITs UINTerval"]);
    }

    #[test]
    fn channel_switches() {
        let mock = MockTransport::new();
        let mut dca = scope(&mock);
        dca.set_filter(1, true).unwrap();
        dca.set_input_display(3, false).unwrap();
        dca.set_function_display(2, true).unwrap();
        assert_eq!(
            mock.writes(),
            vec![":CHAN1A:FILTer ON", ":CHAN3A:DISlay OFF", ":FUNC2:DISPlay ON"]
        );
    }
}
