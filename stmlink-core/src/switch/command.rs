//! Key → command mapping.
//!
//! | key | effect                               |
//! |-----|--------------------------------------|
//! | `1` | publish `ON`, flag = true            |
//! | `0` | publish `OFF`, flag = false          |
//! | `t` | flip flag, publish the new value     |
//! | `q` | quit, nothing published              |
//!
//! Keys are matched case-insensitively. Anything else is ignored.

use std::fmt;

/// The two payloads ever published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Payload {
    On,
    Off,
}

impl Payload {
    /// Payload for a flag value.
    pub const fn from_state(is_on: bool) -> Self {
        if is_on { Payload::On } else { Payload::Off }
    }

    /// Exact wire text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Payload::On => "ON",
            Payload::Off => "OFF",
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the session should do with a decoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Publish(Payload),
    Quit,
    Ignore,
}

/// Console help, printed once the broker accepts the connection.
pub const HELP_LINES: [&str; 5] = [
    "Controls:",
    "  press '1' to send ON",
    "  press '0' to send OFF",
    "  press 't' to toggle ON/OFF",
    "  press 'q' to quit",
];

/// Local on/off flag. Mirrors the last command sent, not the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchState {
    is_on: bool,
}

impl SwitchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Apply one key and return the resulting action.
    pub fn apply(&mut self, key: char) -> KeyAction {
        match key.to_ascii_lowercase() {
            '1' => {
                self.is_on = true;
                KeyAction::Publish(Payload::On)
            }
            '0' => {
                self.is_on = false;
                KeyAction::Publish(Payload::Off)
            }
            't' => {
                self.is_on = !self.is_on;
                KeyAction::Publish(Payload::from_state(self.is_on))
            }
            'q' => KeyAction::Quit,
            _ => KeyAction::Ignore,
        }
    }
}

/// Decode the bytes of one keypress.
///
/// Returns `None` for invalid UTF-8 or for input that is not exactly one
/// character. The result is lower-cased.
pub fn decode_key(bytes: &[u8]) -> Option<char> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut chars = text.chars();
    let key = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    key.to_lowercase().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(keys: &str) -> (SwitchState, Vec<KeyAction>) {
        let mut state = SwitchState::new();
        let actions = keys.chars().map(|k| state.apply(k)).collect();
        (state, actions)
    }

    #[test]
    fn one_publishes_on() {
        let (state, actions) = run("1");
        assert_eq!(actions, vec![KeyAction::Publish(Payload::On)]);
        assert!(state.is_on());
    }

    #[test]
    fn zero_then_toggle_publishes_on() {
        let (state, actions) = run("0t");
        assert_eq!(
            actions,
            vec![KeyAction::Publish(Payload::Off), KeyAction::Publish(Payload::On)]
        );
        assert!(state.is_on());
    }

    #[test]
    fn toggle_from_default_publishes_on() {
        let (_, actions) = run("t");
        assert_eq!(actions, vec![KeyAction::Publish(Payload::On)]);
    }

    #[test]
    fn toggle_twice_returns_to_off() {
        let (state, actions) = run("tt");
        assert_eq!(actions[1], KeyAction::Publish(Payload::Off));
        assert!(!state.is_on());
    }

    #[test]
    fn quit_and_unknown_keys_leave_flag_alone() {
        let (state, actions) = run("1xq ");
        assert_eq!(
            actions,
            vec![
                KeyAction::Publish(Payload::On),
                KeyAction::Ignore,
                KeyAction::Quit,
                KeyAction::Ignore,
            ]
        );
        assert!(state.is_on());
    }

    #[test]
    fn uppercase_keys_match() {
        let (_, actions) = run("TQ");
        assert_eq!(actions, vec![KeyAction::Publish(Payload::On), KeyAction::Quit]);
    }

    #[test]
    fn decode_rejects_non_utf8() {
        assert_eq!(decode_key(&[0xE0]), None);
        assert_eq!(decode_key(&[0xFF, 0x31]), None);
        assert_eq!(decode_key(b""), None);
        assert_eq!(decode_key(b"10"), None);
    }

    #[test]
    fn decode_lowercases() {
        assert_eq!(decode_key(b"T"), Some('t'));
        assert_eq!(decode_key(b"1"), Some('1'));
        assert_eq!(decode_key("é".as_bytes()), Some('é'));
    }

    #[test]
    fn payload_text() {
        assert_eq!(Payload::On.to_string(), "ON");
        assert_eq!(Payload::Off.as_str(), "OFF");
        assert_eq!(Payload::from_state(false), Payload::Off);
    }
}
