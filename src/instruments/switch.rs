//! Polatis optical cross-connect switches.

use crate::config::Timing;
use crate::error::Result;
use crate::session::Session;

pub struct OpticalSwitch {
    session: Session,
}

impl OpticalSwitch {
    pub fn connect(address: &str, nickname: &str, timing: Timing) -> Result<Self> {
        Ok(Self::new(Session::connect(address, nickname, timing)?))
    }

    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Patch `input` through to `output`.
    pub fn connect_ports(&mut self, input: u32, output: u32) -> Result<()> {
        self.session
            .write(&format!(":oxc:swit:conn:add (@{input}),(@{output})"))
    }

    pub fn disconnect_ports(&mut self, input: u32, output: u32) -> Result<()> {
        self.session
            .write(&format!(":oxc:swit:conn:sub (@{input}),(@{output})"))
    }

    pub fn disconnect_all(&mut self) -> Result<()> {
        self.session.write(":oxc:swit:disc:all")
    }

    /// Port currently patched to `port`, as the switch reports it.
    pub fn connection(&mut self, port: u32) -> Result<String> {
        let reply = self.session.query(&format!(":oxc:swit:conn:port? {port}"))?;
        Ok(reply.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn patch_commands() {
        let mock = MockTransport::new();
        let mut sw = OpticalSwitch::new(Session::with_transport(
            "TCPIP0::10.0.0.9::3082::SOCKET",
            "Polatis",
            Box::new(mock.clone()),
            Timing::immediate(),
        ));
        sw.connect_ports(1, 17).unwrap();
        sw.disconnect_ports(1, 17).unwrap();
        sw.disconnect_all().unwrap();
        assert_eq!(
            mock.writes(),
            vec![
                ":oxc:swit:conn:add (@1),(@17)",
                ":oxc:swit:conn:sub (@1),(@17)",
                ":oxc:swit:disc:all",
            ]
        );
        mock.respond(":oxc:swit:conn:port? 1", "17\n");
        assert_eq!(sw.connection(1).unwrap(), "17");
    }
}
