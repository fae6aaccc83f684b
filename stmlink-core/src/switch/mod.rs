//! # switch — keypress-to-MQTT publisher
//!
//! ```text
//! KeySource ──► decode_key ──► SwitchState::apply ──► SwitchPublisher
//!  (terminal)    (utf-8,         (1 / 0 / t / q)       (MqttLink)
//!                 lowercase)
//!
//!                 MqttLink delivery task ──[ConnectionEvent]──► SwitchSession
//! ```
//!
//! | Module    | Purpose                                             |
//! |-----------|-----------------------------------------------------|
//! | `command` | Payloads, key table, the on/off flag                |
//! | `input`   | `KeySource` polling trait                           |
//! | `broker`  | rumqttc link, delivery task, connection events      |
//! | `session` | The foreground polling loop                         |

pub mod broker;
pub mod command;
pub mod input;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────

pub use broker::{BrokerConfig, ConnectionEvent, MqttLink, SwitchPublisher};
pub use command::{KeyAction, Payload, SwitchState, decode_key};
pub use input::{KeyInput, KeySource};
pub use session::{POLL_INTERVAL, SessionEnd, SwitchSession};
