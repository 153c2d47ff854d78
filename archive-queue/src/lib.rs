//! The Job Queue (JQ, spec §6): a poller over the `jobs` table feeding a
//! bounded channel, and the at-most-one-owner lease guard built on top of
//! it.

pub mod lease;
pub mod queue;

pub use lease::LeaseGuard;
pub use queue::{now_ms, JobQueue};
