//! Scripted in-memory transport for exercising drivers without hardware.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;
use crate::error::{Error, Result};

/// One interaction recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Write(String),
    Query(String),
    Clear,
    Reopen,
    Close,
}

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail,
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Reply>,
    /// The front reply has been served at least once.
    served: bool,
}

impl Script {
    fn push(&mut self, reply: Reply) {
        if self.served && self.queue.len() == 1 {
            self.queue.clear();
        }
        self.served = false;
        self.queue.push_back(reply);
    }

    fn next(&mut self) -> Option<Reply> {
        if self.queue.len() > 1 {
            return self.queue.pop_front();
        }
        self.served = true;
        self.queue.front().cloned()
    }
}

#[derive(Default)]
struct MockState {
    replies: HashMap<String, Script>,
    log: Vec<Exchange>,
    clear_fails: bool,
}

/// Transport with scripted replies.
///
/// Replies queue per command; the last reply for a command is sticky so a
/// single `respond` serves every later query, until a newer reply is queued. Clones share state, so a test
/// keeps one handle while the driver owns the other.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue a reply for `command`.
    pub fn respond(&self, command: &str, reply: &str) -> &Self {
        self.state()
            .replies
            .entry(command.to_string())
            .or_default()
            .push(Reply::Text(reply.to_string()));
        self
    }

    /// Queue a failure (timeout) for `command`.
    pub fn fail(&self, command: &str) -> &Self {
        self.state()
            .replies
            .entry(command.to_string())
            .or_default()
            .push(Reply::Fail);
        self
    }

    /// Make every later device clear fail.
    pub fn fail_clear(&self) -> &Self {
        self.state().clear_fails = true;
        self
    }

    pub fn log(&self) -> Vec<Exchange> {
        self.state().log.clone()
    }

    /// Commands sent with `write`, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter_map(|e| match e {
                Exchange::Write(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Commands sent with `query`, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter_map(|e| match e {
                Exchange::Query(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, exchange: &Exchange) -> usize {
        self.state().log.iter().filter(|e| *e == exchange).count()
    }

    pub fn reset_log(&self) {
        self.state().log.clear();
    }
}

impl Transport for MockTransport {
    fn write(&mut self, command: &str) -> Result<()> {
        self.state().log.push(Exchange::Write(command.to_string()));
        Ok(())
    }

    fn query(&mut self, command: &str) -> Result<String> {
        let mut state = self.state();
        state.log.push(Exchange::Query(command.to_string()));
        let reply = state.replies.get_mut(command).and_then(Script::next);
        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("scripted failure for '{command}'"),
            ))),
            None => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no reply scripted for '{command}'"),
            ))),
        }
    }

    fn clear(&mut self) -> Result<()> {
        let mut state = self.state();
        state.log.push(Exchange::Clear);
        if state.clear_fails {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "scripted device clear failure",
            )));
        }
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.state().log.push(Exchange::Reopen);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state().log.push(Exchange::Close);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_queue_and_last_one_sticks() {
        let mock = MockTransport::new();
        mock.respond("CH?", "21").respond("CH?", "34");
        let mut link = mock.clone();
        assert_eq!(link.query("CH?").unwrap(), "21");
        assert_eq!(link.query("CH?").unwrap(), "34");
        assert_eq!(link.query("CH?").unwrap(), "34");
        assert_eq!(mock.queries().len(), 3);
    }

    #[test]
    fn newer_reply_replaces_served_sticky_one() {
        let mock = MockTransport::new();
        let mut link = mock.clone();
        mock.respond("ANA?", "A");
        assert_eq!(link.query("ANA?").unwrap(), "A");
        mock.respond("ANA?", "B");
        assert_eq!(link.query("ANA?").unwrap(), "B");
        assert_eq!(link.query("ANA?").unwrap(), "B");
    }

    #[test]
    fn scripted_failure_then_success() {
        let mock = MockTransport::new();
        mock.fail("*IDN?").respond("*IDN?", "EXFO,LTB");
        let mut link = mock.clone();
        assert!(link.query("*IDN?").is_err());
        assert_eq!(link.query("*IDN?").unwrap(), "EXFO,LTB");
    }

    #[test]
    fn unscripted_query_times_out() {
        let mut link = MockTransport::new();
        assert!(link.query("SPAN?").is_err());
        link.write("SGL").unwrap();
        assert_eq!(link.writes(), vec!["SGL".to_string()]);
    }
}
