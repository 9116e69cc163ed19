//! # Failure strategies for a run.
//!
//! [`FailStrategy`] decides what an ordinary task failure means for the whole run.
//!
//! - [`FailStrategy::AnyOne`] the first failed stage halts the run (default).
//! - [`FailStrategy::EveryOne`] failed stages are recorded and the run continues;
//!   it fails only if every task of every stage ended in `fail`.
//!
//! ## Decision table
//! ```text
//! stage error            AnyOne            EveryOne
//! ─────────────────────  ────────────────  ─────────────────────────────
//! task error             fail run now      continue with next stage
//! runner timeout         fail run now      fail run now
//! queue drained          end               end, or AllFailed if no task ended
//! ```

/// Policy controlling whether a task failure fails the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailStrategy {
    /// Any failed task fails the run (default).
    #[default]
    AnyOne,
    /// The run fails only if every task failed.
    EveryOne,
}

impl FailStrategy {
    /// Returns `true` when an ordinary stage failure must halt the run.
    #[inline]
    pub fn halts_on_stage_error(&self) -> bool {
        matches!(self, FailStrategy::AnyOne)
    }

    /// Returns the strategy name as used in configuration (`"anyOne"` / `"everyOne"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FailStrategy::AnyOne => "anyOne",
            FailStrategy::EveryOne => "everyOne",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_any_one() {
        assert_eq!(FailStrategy::default(), FailStrategy::AnyOne);
        assert!(FailStrategy::AnyOne.halts_on_stage_error());
        assert!(!FailStrategy::EveryOne.halts_on_stage_error());
        assert_eq!(FailStrategy::EveryOne.as_str(), "everyOne");
    }
}
