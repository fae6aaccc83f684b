//! Non-blocking key polling.

use crate::error::LinkError;

/// One polled keypress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// Raw bytes of a single key, not yet decoded.
    Bytes(Vec<u8>),
    /// The user asked to interrupt (Ctrl-C while the terminal is raw).
    Interrupt,
}

impl KeyInput {
    /// Convenience for sources that already hold a `char`.
    pub fn from_char(c: char) -> Self {
        let mut buf = [0u8; 4];
        KeyInput::Bytes(c.encode_utf8(&mut buf).as_bytes().to_vec())
    }
}

/// Something the session can poll for at most one buffered key.
pub trait KeySource {
    /// Return the next buffered key, or `None` when nothing is waiting.
    /// Must not block.
    fn try_read_key(&mut self) -> Result<Option<KeyInput>, LinkError>;
}
