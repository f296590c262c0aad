//! Funding-schedule state machine.

use crate::domain::{Decimal, Funding, PoolState, Timestamp};

/// Classification of a set of funding schedules at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Schedule {
    pub state: PoolState,
    /// Emission rate of the active schedules, or of the nearest upcoming ones
    /// while boiling. Zero otherwise.
    pub shares_per_second: Decimal,
}

/// Evaluate `fundings` at `now`.
///
/// - Active: some unclean schedule's `[start, end)` contains now; rates of
///   all such schedules sum.
/// - Boiling: some schedule starts in `(now, now + lookahead]`; the rate is
///   the sum over schedules starting at the nearest such start.
/// - Stale: any funding exists at all.
/// - Unfunded: otherwise.
pub fn evaluate<'a, I>(fundings: I, now: Timestamp, lookahead_secs: i64) -> Schedule
where
    I: IntoIterator<Item = &'a Funding>,
{
    let horizon = now.saturating_add(lookahead_secs);
    let mut any = false;
    let mut active_rate: Option<Decimal> = None;
    let mut next: Option<(Timestamp, Decimal)> = None;

    for funding in fundings {
        any = true;
        if funding.cleaned {
            continue;
        }
        if funding.is_active_at(now) {
            let rate = active_rate.get_or_insert_with(Decimal::zero);
            *rate += funding.shares_per_second;
        } else if funding.start > now && funding.start <= horizon {
            next = match next {
                Some((start, rate)) if start == funding.start => {
                    Some((start, rate + funding.shares_per_second))
                }
                Some((start, rate)) if start < funding.start => Some((start, rate)),
                _ => Some((funding.start, funding.shares_per_second)),
            };
        }
    }

    match (active_rate, next) {
        (Some(rate), _) => Schedule {
            state: PoolState::Active,
            shares_per_second: rate,
        },
        (None, Some((_, rate))) => Schedule {
            state: PoolState::Boiling,
            shares_per_second: rate,
        },
        (None, None) if any => Schedule {
            state: PoolState::Stale,
            shares_per_second: Decimal::zero(),
        },
        (None, None) => Schedule::default(),
    }
}

/// Ordering used to fold per-token states into one pool state.
pub fn precedence(state: PoolState) -> u8 {
    match state {
        PoolState::Active => 3,
        PoolState::Boiling => 2,
        PoolState::Stale => 1,
        PoolState::Unfunded => 0,
    }
}
