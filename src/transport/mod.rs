//! Byte-level links to instruments.
//!
//! Every instrument family talks SCPI text through a [`Transport`]. Raw SCPI
//! sockets are handled natively; GPIB, USB and VXI-11 resources go through a
//! VISA library when the `visa` feature is enabled.

mod mock;
mod tcp;
#[cfg(feature = "visa")]
mod visa;

pub use mock::{Exchange, MockTransport};
pub use tcp::TcpTransport;
#[cfg(feature = "visa")]
pub use visa::VisaTransport;

use std::time::Duration;

use crate::address::ResourceAddress;
use crate::error::{Error, Result};

/// A line-oriented SCPI link.
pub trait Transport: Send {
    /// Send a command that produces no reply.
    fn write(&mut self, command: &str) -> Result<()>;

    /// Send a query and return its reply without the line terminator.
    fn query(&mut self, command: &str) -> Result<String>;

    /// Device clear: abort pending output and flush buffers.
    fn clear(&mut self) -> Result<()>;

    /// Close the resource and open it again at the same address.
    fn reopen(&mut self) -> Result<()>;

    /// Release the resource.
    fn close(&mut self) -> Result<()>;
}

/// Open the transport matching the kind of resource string.
pub fn open(address: &ResourceAddress, timeout: Duration) -> Result<Box<dyn Transport>> {
    match address {
        ResourceAddress::Socket { host, port, .. } => {
            Ok(Box::new(TcpTransport::connect(host, *port, timeout)?))
        }
        _ => open_visa(address, timeout),
    }
}

#[cfg(feature = "visa")]
fn open_visa(address: &ResourceAddress, timeout: Duration) -> Result<Box<dyn Transport>> {
    Ok(Box::new(VisaTransport::open(&address.to_string(), timeout)?))
}

#[cfg(not(feature = "visa"))]
fn open_visa(address: &ResourceAddress, _timeout: Duration) -> Result<Box<dyn Transport>> {
    tracing::error!(%address, "resource needs a VISA library");
    Err(Error::FeatureNotEnabled("visa".to_string()))
}

/// Strip the trailing CR/LF a reply line carries.
pub(crate) fn trim_reply(line: &str) -> String {
    line.trim_end_matches(['\r', '\n']).to_string()
}
