//! Derived-state engines: pool valuation, schedules, lot reconciliation and
//! the platform aggregate.
//!
//! Everything here is synchronous and deterministic given the event order
//! and the chain reads it performs.

pub mod modules;
pub mod platform;
pub mod pool_state;
pub mod reconciler;
pub mod schedule;

pub use modules::{shape_for, Funded, RewardShape};
pub use platform::{admit, apply_pool_delta, sweep, PoolValue, SweepOutcome};
pub use pool_state::{annual_rate, day_snapshot, refresh, PoolBundle, SECONDS_PER_YEAR};
pub use reconciler::{
    close_if_empty, reconcile_claim, reconcile_stake, reconcile_unstake, refresh_position_shares,
};
pub use schedule::{evaluate, Schedule};
