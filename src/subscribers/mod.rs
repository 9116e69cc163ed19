//! # Event subscribers for the stagevisor runner.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   run_task / run_stage / Runner ── publish(Event) ──► Bus ──► listener
//!                                                                  │
//!                                                     SubscriberSet::emit(&Event)
//!                                                    ┌─────────┼─────────┐
//!                                                    ▼         ▼         ▼
//!                                                LogWriter  Metrics   Custom
//! ```
//!
//! Subscribers are the runner's only listeners; `Runner::destroy` detaches them.

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod embedded;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

pub(crate) use set::panic_message;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
