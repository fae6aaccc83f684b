//! Terminal plumbing: raw-mode key polling and a log writer that keeps
//! lines aligned while raw mode is on.

use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use stmlink_core::LinkError;
use stmlink_core::switch::{KeyInput, KeySource};

// ── Keys ─────────────────────────────────────────────────────────

/// Keyboard of the controlling terminal, read without blocking.
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn try_read_key(&mut self) -> Result<Option<KeyInput>, LinkError> {
        // Skip resize/focus events and key releases; stop at the first key.
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if let Some(input) = translate_key(&key) {
                    return Ok(Some(input));
                }
            }
        }
        Ok(None)
    }
}

/// Map a crossterm key event to session input.
pub fn translate_key(key: &KeyEvent) -> Option<KeyInput> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            Some(KeyInput::Interrupt)
        }
        KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::CONTROL) => None,
        KeyCode::Char(c) => Some(KeyInput::from_char(c)),
        _ => None,
    }
}

// ── Raw mode ─────────────────────────────────────────────────────

/// Keeps the terminal in raw mode until dropped.
pub struct RawModeGuard(());

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("failed to restore terminal: {e}");
        }
    }
}

// ── Log writer ───────────────────────────────────────────────────

/// Rewrites `\n` as `\r\n`.
pub struct CrlfWriter<W> {
    inner: W,
    /// The last byte of the previous write was `\r`.
    last_was_cr: bool,
}

impl<W: Write> CrlfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            last_was_cr: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl CrlfWriter<io::Stderr> {
    /// For `tracing_subscriber::fmt().with_writer(..)`.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut start = 0;
        let mut prev_cr = self.last_was_cr;
        for (i, &b) in buf.iter().enumerate() {
            if b == b'\n' && !prev_cr {
                self.inner.write_all(&buf[start..i])?;
                self.inner.write_all(b"\r\n")?;
                start = i + 1;
            }
            prev_cr = b == b'\r';
        }
        self.inner.write_all(&buf[start..])?;
        if !buf.is_empty() {
            self.last_was_cr = prev_cr;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn chars_become_key_bytes() {
        assert_eq!(
            translate_key(&press(KeyCode::Char('t'), KeyModifiers::NONE)),
            Some(KeyInput::Bytes(b"t".to_vec()))
        );
        assert_eq!(
            translate_key(&press(KeyCode::Char('Q'), KeyModifiers::SHIFT)),
            Some(KeyInput::Bytes(b"Q".to_vec()))
        );
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        assert_eq!(
            translate_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyInput::Interrupt)
        );
        assert_eq!(translate_key(&press(KeyCode::Char('t'), KeyModifiers::CONTROL)), None);
    }

    #[test]
    fn releases_and_special_keys_are_ignored() {
        let mut release = press(KeyCode::Char('1'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(translate_key(&release), None);
        assert_eq!(translate_key(&press(KeyCode::Up, KeyModifiers::NONE)), None);
        assert_eq!(translate_key(&press(KeyCode::Enter, KeyModifiers::NONE)), None);
    }

    #[test]
    fn crlf_writer_translates_newlines() {
        let mut w = CrlfWriter::new(Vec::new());
        w.write_all(b"one\ntwo\r\nthree\n").unwrap();
        assert_eq!(w.into_inner(), b"one\r\ntwo\r\nthree\r\n".to_vec());
    }

    #[test]
    fn crlf_split_across_writes_is_not_doubled() {
        let mut w = CrlfWriter::new(Vec::new());
        w.write_all(b"one\r").unwrap();
        w.write_all(b"\ntwo").unwrap();
        w.write_all(b"").unwrap();
        w.write_all(b"\n").unwrap();
        assert_eq!(w.into_inner(), b"one\r\ntwo\r\n".to_vec());
    }
}
