//! discord-tools: Discord channel messaging exposed as agent tools.
//!
//! Two tools are provided, `discord_send_message` and
//! `discord_read_history`. Each call is a single authenticated round-trip
//! to the Discord REST API, normalized into a uniform result shape.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod logging;

pub mod tools;
