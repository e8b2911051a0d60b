//!  Storage is organized through [document::JsonDocument].
//!  The basic idea is:
//!   - There is an application directory with two documents, configuration and history.
//!   - Documents are small, so every save rewrites the whole file atomically.
//!   - Anything unreadable is treated as missing data, never as a fatal error.

pub mod document;
pub mod entities;
pub mod error;

pub const CONFIG_FILE: &str = "config.json";
pub const HISTORY_FILE: &str = "history.json";
