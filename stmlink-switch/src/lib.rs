//! # stmlink-switch — keyboard MQTT switch
//!
//! Connects to an MQTT broker and turns single keypresses into `ON` /
//! `OFF` messages on one topic, the topic an LED-controlling device
//! subscribes to.
//!
//! | Key | Sends                       |
//! |-----|-----------------------------|
//! | `1` | `ON`                        |
//! | `0` | `OFF`                       |
//! | `t` | the opposite of the last    |
//! | `q` | nothing, quits              |

pub mod config;
pub mod terminal;
