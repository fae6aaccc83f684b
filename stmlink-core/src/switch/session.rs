//! Foreground loop of the switch publisher.
//!
//! Every `poll_interval` the session:
//!
//! 1. drains pending [`ConnectionEvent`]s and reports them,
//! 2. takes at most one key from the [`KeySource`],
//! 3. maps it through [`SwitchState`] and publishes if needed.
//!
//! The session owns no connection logic; tear-down of the broker link is
//! left to the caller so it runs on every exit path.

use std::io::Write;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::switch::broker::{ConnectionEvent, SwitchPublisher};
use crate::switch::command::{HELP_LINES, KeyAction, SwitchState, decode_key};
use crate::switch::input::{KeyInput, KeySource};

/// Default key polling period.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why [`SwitchSession::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The quit key was pressed.
    Quit,
    /// An interrupt arrived through the key source.
    Interrupted,
}

pub struct SwitchSession<K, P, W> {
    keys: K,
    publisher: P,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    out: W,
    topic: String,
    poll_interval: Duration,
    state: SwitchState,
    published: u64,
}

impl<K, P, W> SwitchSession<K, P, W>
where
    K: KeySource,
    P: SwitchPublisher,
    W: Write,
{
    pub fn new(
        keys: K,
        publisher: P,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        out: W,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            publisher,
            events,
            out,
            topic: topic.into(),
            poll_interval: POLL_INTERVAL,
            state: SwitchState::new(),
            published: 0,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Poll until the quit key or an interrupt key.
    pub async fn run(&mut self) -> Result<SessionEnd, LinkError> {
        loop {
            self.drain_events()?;

            if let Some(input) = self.keys.try_read_key()? {
                if let Some(end) = self.handle_input(input).await? {
                    return Ok(end);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Process one polled input.
    pub async fn handle_input(&mut self, input: KeyInput) -> Result<Option<SessionEnd>, LinkError> {
        match input {
            KeyInput::Interrupt => {
                self.say("interrupted by user")?;
                Ok(Some(SessionEnd::Interrupted))
            }
            KeyInput::Bytes(bytes) => match decode_key(&bytes) {
                Some(key) => self.handle_key(key).await,
                None => {
                    debug!("ignoring undecodable key {bytes:02x?}");
                    Ok(None)
                }
            },
        }
    }

    /// Apply a decoded key.
    pub async fn handle_key(&mut self, key: char) -> Result<Option<SessionEnd>, LinkError> {
        match self.state.apply(key) {
            KeyAction::Publish(payload) => {
                match self.publisher.publish(payload).await {
                    Ok(()) => {
                        self.published += 1;
                        info!(topic = %self.topic, %payload, "published");
                        let line = format!("sent '{payload}' to topic '{}'", self.topic);
                        self.say(&line)?;
                    }
                    Err(e) => warn!("publish of {payload} failed: {e}"),
                }
                Ok(None)
            }
            KeyAction::Quit => {
                self.say("quitting...")?;
                Ok(Some(SessionEnd::Quit))
            }
            KeyAction::Ignore => Ok(None),
        }
    }

    /// Report every connection event received since the last call.
    pub fn drain_events(&mut self) -> Result<(), LinkError> {
        while let Ok(event) = self.events.try_recv() {
            match event {
                ConnectionEvent::Accepted { session_present } => {
                    info!(session_present, "broker accepted connection");
                    self.say("connected to MQTT broker")?;
                    for line in HELP_LINES {
                        self.say(line)?;
                    }
                }
                ConnectionEvent::Refused { code, reason } => {
                    warn!("broker refused connection: {reason} (code {code})");
                    let line = format!("connection failed, return code: {code}");
                    self.say(&line)?;
                }
                ConnectionEvent::Lost(reason) => {
                    warn!("broker connection lost: {reason}");
                }
            }
        }
        Ok(())
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Payloads successfully handed to the publisher.
    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Give back the publisher for tear-down.
    pub fn into_publisher(self) -> P {
        self.publisher
    }

    /// One console line. `\r\n` keeps lines aligned while the terminal is
    /// in raw mode.
    fn say(&mut self, line: &str) -> Result<(), LinkError> {
        write!(self.out, "{line}\r\n")?;
        self.out.flush()?;
        Ok(())
    }
}
