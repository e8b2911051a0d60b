//! Tracks the time spent reading PDF documents every day.
//!
//! A small daemon samples the running processes for known document viewers and accumulates the
//! time they were open into a per day history. The cli starts and stops the daemon and renders
//! the persisted state without ever writing it.

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod process_api;
pub mod report;
pub mod utils;
