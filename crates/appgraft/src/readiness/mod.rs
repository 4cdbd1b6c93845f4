//! Bounded polling until cluster resources reach a desired condition.
//!
//! A wait starts with every check pending. Each tick evaluates the still
//! pending checks one after another; a check that reports ready leaves the
//! set, a check that errors stays in it. The wait converges when the set is
//! empty and times out, as a whole, when the deadline passes first.

pub mod checks;
pub mod waiter;

pub use checks::{Condition, ReadinessCheck};
pub use waiter::{wait_for, ReadinessWaiter, WaitOptions, WaitOutcome, WaitState};
