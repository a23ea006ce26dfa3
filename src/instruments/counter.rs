//! Keysight universal frequency counters.

use std::fmt;

use tracing::info;

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::session::{parse_number, Identity, Session};

/// Input used when none is given.
pub const DEFAULT_INPUT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterModel {
    K53220A,
    K53230A,
    K53132A,
}

impl CounterModel {
    pub fn from_model(model: &str) -> Option<Self> {
        match model.trim() {
            "53220A" => Some(CounterModel::K53220A),
            "53230A" => Some(CounterModel::K53230A),
            "53132A" => Some(CounterModel::K53132A),
            _ => None,
        }
    }

    fn frequency_command(&self, input: u32) -> String {
        match self {
            CounterModel::K53220A | CounterModel::K53230A => {
                format!("MEAS:FREQ? DEF,DEF,(@{input})")
            }
            CounterModel::K53132A => "READ:FREQ?".to_string(),
        }
    }
}

impl fmt::Display for CounterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CounterModel::K53220A => "53220A",
            CounterModel::K53230A => "53230A",
            CounterModel::K53132A => "53132A",
        })
    }
}

pub struct FrequencyCounter {
    session: Session,
    model: String,
}

impl FrequencyCounter {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Self::new(Session::connect(address, nickname, timing)?)
    }

    /// Reads the model from `*IDN?`. An unsupported model is only reported
    /// when a measurement is attempted.
    pub fn new(mut session: Session) -> Result<Self> {
        let model = Identity::parse(&session.idn()?).model;
        info!(address = session.address(), model = %model, "frequency counter identified");
        Ok(Self { session, model })
    }

    pub fn model(&self) -> Option<CounterModel> {
        CounterModel::from_model(&self.model)
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Frequency in Hz measured on `input`. The 53132A ignores the input.
    pub fn frequency(&mut self, input: u32) -> Result<f64> {
        let model = self
            .model()
            .ok_or_else(|| Error::UnknownInstrument(format!("counter model '{}'", self.model)))?;
        let command = model.frequency_command(input);
        let reply = self.session.query_retry(&command)?;
        parse_number(&command, &reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    fn counter(mock: &MockTransport, idn: &str) -> FrequencyCounter {
        mock.respond("*IDN?", idn);
        FrequencyCounter::new(Session::with_transport(
            "GPIB0::3::INSTR",
            "Counter",
            Box::new(mock.clone()),
            Timing::immediate(),
        ))
        .unwrap()
    }

    #[test]
    fn newer_models_measure_on_an_input() {
        let mock = MockTransport::new();
        let mut fc = counter(&mock, "Agilent Technologies,53230A,MY123,02.05");
        assert_eq!(fc.model(), Some(CounterModel::K53230A));
        mock.respond("MEAS:FREQ? DEF,DEF,(@3)", "+1.56250001E+008");
        assert_eq!(fc.frequency(DEFAULT_INPUT).unwrap(), 1.56250001e8);
    }

    #[test]
    fn older_model_reads_and_retries_once() {
        let mock = MockTransport::new();
        let mut fc = counter(&mock, "HEWLETT-PACKARD,53132A,0,4806");
        mock.fail("READ:FREQ?").respond("READ:FREQ?", "1.0E+07");
        assert_eq!(fc.frequency(1).unwrap(), 1.0e7);
    }

    #[test]
    fn unknown_model_cannot_measure() {
        let mock = MockTransport::new();
        let mut fc = counter(&mock, "Keysight,33500B,MY1,1.0");
        assert!(matches!(fc.frequency(3), Err(Error::UnknownInstrument(_))));
        assert!(mock.queries().iter().all(|q| q == "*IDN?"));
    }
}
