//! Keysight M8000 series bit error ratio tester.
//!
//! The M8000 is reached over a raw SCPI socket, by default
//! `TCPIP0::172.20.240.110::5025::SOCKET` on the bench network.

use tracing::info;

use crate::config::Timing;
use crate::error::Result;
use crate::session::Session;

pub const DEFAULT_ADDRESS: &str = "TCPIP0::172.20.240.110::5025::SOCKET";

const SYSTEM: &str = "'M1.System'";

const PRBS31_GENERATOR: &str = r#"<?xml version="1.0" encoding="utf-16"?><sequenceDefinition xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://www.agilent.com/schemas/M8000/DataSequence">  <description />  <sequence>    <loop>      <block length="256">        <prbs polynomial="2^31-1" />      </block>    </loop>  </sequence></sequenceDefinition>"#;

const PRBS31_ANALYZER: &str = r#"<?xml version="1.0" encoding="utf-16"?><sequenceDefinition xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns="http://www.agilent.com/schemas/M8000/DataSequence">  <description />  <sequence>    <syncAndLoopBlock length="128">      <prbs polynomial="2^31-1" />    </syncAndLoopBlock>  </sequence></sequenceDefinition>"#;

/// IEEE 488.2 definite-length block: `#`, digit count, byte count, payload.
pub fn definite_length_block(payload: &str) -> String {
    let len = payload.len().to_string();
    format!("#{}{}{}", len.len(), len, payload)
}

fn flag(on: bool) -> u8 {
    if on { 1 } else { 0 }
}

pub struct Bert {
    session: Session,
}

impl Bert {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Ok(Self::new(Session::connect(address, nickname, timing)?))
    }

    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Recall a saved user workspace and wait for it to load.
    pub fn recall_state(&mut self, file: &str) -> Result<()> {
        info!(file, "recalling BERT workspace");
        self.session
            .write(&format!("MMEMory:WORKspace:SETTings:USER:RECall '{file}'"))?;
        self.session.settle(self.session.timing().recall_settle);
        Ok(())
    }

    /// Load PRBS 2^31-1 on the generator and analyzer and bind them to the
    /// data ports.
    pub fn configure_prbs31(&mut self) -> Result<()> {
        self.session.write(&format!(
            ":DATA:SEQuence:SET:VALue 'Generator',{}",
            definite_length_block(PRBS31_GENERATOR)
        ))?;
        self.session.write(&format!(
            ":DATA:SEQuence:SET:VALue 'Analyzer',{}",
            definite_length_block(PRBS31_ANALYZER)
        ))?;
        self.session
            .write(":DATA:SEQuence:BIND 'Generator','M2.DataOut'")?;
        self.session
            .write(":DATA:SEQuence:BIND 'Analyzer','M1.DataIn1','M1.DataIn2'")
    }

    pub fn set_global_outputs(&mut self, on: bool) -> Result<()> {
        self.session
            .write(&format!(":OUTPut:GLOBal:STATe {SYSTEM},{}", flag(on)))
    }

    /// Jitter impairments on the generator.
    pub fn set_impairments(&mut self, on: bool) -> Result<()> {
        self.session
            .write(&format!(":SOURce:JITTer:GLOBal:STATe {SYSTEM},{}", flag(on)))
    }

    /// Spread-spectrum clock locking.
    pub fn set_ssc(&mut self, on: bool) -> Result<()> {
        self.session
            .write(&format!(":SOURce:SSCLocking:GLOBal:STATe {SYSTEM},{}", flag(on)))
    }

    /// Insert a single bit error on the generator output.
    pub fn insert_error(&mut self) -> Result<()> {
        self.session.write("OUTPut:EINSertion:ONCE 'M2.DataOut'")
    }
}
