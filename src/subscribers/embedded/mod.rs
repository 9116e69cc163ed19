//! # Built-in subscribers
//!
//! - [`LogWriter`]: writes events through `tracing` (feature `logging`).

mod log;

pub use log::LogWriter;
