use std::ffi::CString;
use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use tracing::info;
use visa_rs::prelude::*;

use super::{trim_reply, Transport};
use crate::error::{Error, Result};

fn io_to_vs_err(err: std::io::Error) -> visa_rs::Error {
    visa_rs::io_to_vs_err(err)
}

/// A VISA session (GPIB, USB, VXI-11, HiSLIP).
pub struct VisaTransport {
    resource: String,
    timeout: Duration,
    rm: DefaultRM,
    instr: Option<Instrument>,
}

impl VisaTransport {
    pub fn open(resource: &str, timeout: Duration) -> Result<Self> {
        let rm = DefaultRM::new()?;
        let instr = open_instrument(&rm, resource, timeout)?;
        info!(resource, "VISA session opened");
        Ok(Self {
            resource: resource.to_string(),
            timeout,
            rm,
            instr: Some(instr),
        })
    }

    fn instr(&mut self) -> Result<&mut Instrument> {
        let resource = &self.resource;
        self.instr.as_mut().ok_or_else(|| Error::Connection {
            address: resource.clone(),
            reason: "VISA session is closed".to_string(),
        })
    }
}

fn open_instrument(rm: &DefaultRM, resource: &str, timeout: Duration) -> Result<Instrument> {
    let resource_string =
        CString::new(resource).map_err(|_| Error::InvalidAddress(resource.to_string()))?;
    Ok(rm.open(&resource_string.into(), AccessMode::NO_LOCK, timeout)?)
}

impl Transport for VisaTransport {
    fn write(&mut self, command: &str) -> Result<()> {
        let line = format!("{command}\n");
        self.instr()?
            .write_all(line.as_bytes())
            .map_err(io_to_vs_err)?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.write(command)?;
        let instr = self.instr()?;
        let mut response = String::new();
        {
            // Scope the reader so the session is free for the next command
            let mut reader = BufReader::new(&*instr);
            reader.read_line(&mut response).map_err(io_to_vs_err)?;
        }
        Ok(trim_reply(&response))
    }

    fn clear(&mut self) -> Result<()> {
        self.instr()?.clear()?;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.instr = None;
        let instr = open_instrument(&self.rm, &self.resource, self.timeout)?;
        self.instr = Some(instr);
        info!(resource = %self.resource, "VISA session reopened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.instr = None;
        Ok(())
    }
}
