//! Core of the helm operator console: realtime session channels, the console
//! view-model, command-line input handling and the lazy drive tree.
//!
//! Everything here is front-end agnostic; `helm-tui` drives it from a
//! terminal.

pub mod access;
pub mod channel;
pub mod command_line;
pub mod config;
pub mod console;
pub mod history;
pub mod log;
pub mod monitoring;
pub mod suggest;
pub mod tree;
