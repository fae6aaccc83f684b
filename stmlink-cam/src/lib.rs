//! # stmlink-cam — screen-to-UDP camera emulator
//!
//! Captures the desktop, downsizes every frame to 640×480, compresses it to
//! JPEG and sends it as one `[u32 LE counter][jpeg]` UDP datagram, the same
//! stream a low-cost camera module produces. Lets the receiving side be
//! developed without the camera hardware.
//!
//! ## Modes
//!
//! - **Stream** (default): capture → encode → send, about 30 iterations/s.
//! - **Test pattern** (`--test-pattern`): stream a synthetic gradient on
//!   machines without a display.
//! - **Monitor** (`--listen`): receive a stream and log what arrives.

pub mod config;
pub mod monitor;
pub mod service;
