use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{trim_reply, Transport};
use crate::error::{Error, Result};

/// Raw SCPI over a TCP socket (`TCPIP0::<host>::5025::SOCKET`).
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    reader: Option<BufReader<TcpStream>>,
    /// A read failed, so a late reply may still arrive on this socket.
    stale: bool,
}

impl TcpTransport {
    /// Connect and apply read/write timeouts so a silent instrument cannot hang us.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let stream = open_stream(host, port, timeout)?;
        info!(host, port, "socket connected");
        Ok(Self {
            host: host.to_string(),
            port,
            timeout,
            reader: Some(BufReader::new(stream)),
            stale: false,
        })
    }

    /// Replace a socket that may still deliver an abandoned reply.
    fn resync(&mut self) -> Result<()> {
        if self.stale {
            warn!(host = %self.host, "discarding socket after a failed read");
            self.reopen()?;
        }
        Ok(())
    }

    fn reader(&mut self) -> Result<&mut BufReader<TcpStream>> {
        self.reader.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket is closed",
            ))
        })
    }
}

fn open_stream(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{host} did not resolve"),
        ))
    })?;
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl Transport for TcpTransport {
    fn write(&mut self, command: &str) -> Result<()> {
        self.resync()?;
        let line = format!("{command}\n");
        self.reader()?.get_mut().write_all(line.as_bytes())?;
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        self.write(command)?;
        let mut response = String::new();
        let read = match self.reader()?.read_line(&mut response) {
            Ok(read) => read,
            Err(e) => {
                self.stale = true;
                return Err(e.into());
            }
        };
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "instrument closed the socket",
            )));
        }
        Ok(trim_reply(&response))
    }

    fn clear(&mut self) -> Result<()> {
        // Sockets have no device clear; drop whatever output is still pending.
        self.resync()?;
        let reader = self.reader()?;
        let buffered = reader.buffer().len();
        reader.consume(buffered);

        let stream = reader.get_mut();
        stream.set_nonblocking(true)?;
        let mut scratch = [0u8; 512];
        let drained = loop {
            match stream.read(&mut scratch) {
                Ok(0) => break Ok(()),
                Ok(_) => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        stream.set_nonblocking(false)?;
        drained?;
        debug!(host = %self.host, discarded = buffered, "socket cleared");
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.close()?;
        let stream = open_stream(&self.host, self.port, self.timeout)?;
        self.reader = Some(BufReader::new(stream));
        self.stale = false;
        info!(host = %self.host, port = self.port, "socket reopened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            match reader.get_ref().shutdown(Shutdown::Both) {
                Err(e) if e.kind() != io::ErrorKind::NotConnected => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use crate::config::Timing;
    use crate::Session;

    /// One-connection SCPI echo server: answers `*IDN?` and records writes.
    fn spawn_instrument() -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut seen = Vec::new();
            for line in BufReader::new(stream).lines() {
                let line = line.unwrap();
                if line == "*IDN?" {
                    writer
                        .write_all(b"Agilent Technologies,8164B,DE12345,V5.25\r\n")
                        .unwrap();
                }
                seen.push(line);
            }
            seen
        });
        (port, handle)
    }

    #[test]
    fn query_and_write_over_socket() {
        let (port, server) = spawn_instrument();
        let mut link = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();

        let idn = link.query("*IDN?").unwrap();
        assert_eq!(idn, "Agilent Technologies,8164B,DE12345,V5.25");
        link.write("*RST").unwrap();
        link.close().unwrap();

        let seen = server.join().unwrap();
        assert_eq!(seen, vec!["*IDN?".to_string(), "*RST".to_string()]);
    }

    #[test]
    fn closed_socket_reports_not_connected() {
        let (port, _server) = spawn_instrument();
        let mut link = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        link.close().unwrap();
        assert!(link.write("*CLS").is_err());
    }

    /// Attenuator on a socket that accepts any number of connections.
    /// The very first `INP1:ATT?` is answered late; `BURST` emits unsolicited lines.
    fn spawn_slow_attenuator(delay: Duration) -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let answered_late = Arc::new(AtomicBool::new(false));
        let counter = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = stream.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                let late = Arc::clone(&answered_late);
                thread::spawn(move || {
                    let mut writer = stream.try_clone().unwrap();
                    for line in BufReader::new(stream).lines() {
                        let Ok(line) = line else { break };
                        let reply: &[u8] = match line.as_str() {
                            "*IDN?" => b"Agilent Technologies,8164B,DE1,V5\r\n",
                            "INP1:ATT?" => {
                                if !late.swap(true, Ordering::SeqCst) {
                                    thread::sleep(delay);
                                }
                                b"+2.0E+01\r\n"
                            }
                            "BURST" => b"+1.0\r\n+2.0\r\n",
                            _ => continue,
                        };
                        let _ = writer.write_all(reply);
                    }
                });
            }
        });
        (port, connections)
    }

    #[test]
    fn late_reply_does_not_shift_the_retry() {
        let (port, connections) = spawn_slow_attenuator(Duration::from_millis(150));
        let link = TcpTransport::connect("127.0.0.1", port, Duration::from_millis(100)).unwrap();
        let mut s = Session::with_transport(
            &format!("TCPIP0::127.0.0.1::{port}::SOCKET"),
            "VOA",
            Box::new(link),
            Timing::immediate(),
        );

        assert_eq!(s.query_retry_refresh("INP1:ATT?").unwrap(), "+2.0E+01");
        assert_eq!(s.query("*IDN?").unwrap(), "Agilent Technologies,8164B,DE1,V5");
        assert_eq!(s.query("INP1:ATT?").unwrap(), "+2.0E+01");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_discards_unread_output() {
        let (port, connections) = spawn_slow_attenuator(Duration::ZERO);
        let mut link = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        link.write("BURST").unwrap();
        thread::sleep(Duration::from_millis(100));

        link.clear().unwrap();
        assert_eq!(link.query("*IDN?").unwrap(), "Agilent Technologies,8164B,DE1,V5");
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reopen_connects_again() {
        let (port, connections) = spawn_slow_attenuator(Duration::ZERO);
        let mut link = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        link.close().unwrap();
        assert!(link.query("*IDN?").is_err());

        link.reopen().unwrap();
        assert_eq!(link.query("*IDN?").unwrap(), "Agilent Technologies,8164B,DE1,V5");
        assert_eq!(connections.load(Ordering::SeqCst), 2);
    }
}
