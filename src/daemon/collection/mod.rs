//! Everything the daemon does on each tick: detect a viewer, accumulate time, persist.

pub mod accumulator;
pub mod detector;
pub mod tracker;
