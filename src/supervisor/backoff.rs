//! Randomized exponential backoff between worker attempts.
//!
//! The pre-jitter delay doubles per attempt (`base * 2^(attempt-1)`) and is
//! clamped to a ceiling. Up to a third of that delay is then added or
//! subtracted with equal probability, so the result stays within
//! `[2/3 * d, 4/3 * d]`. No state is kept; callers own the attempt counter.

use rand::Rng;
use std::time::Duration;

/// Default backoff time unit.
pub const DEFAULT_BASE: Duration = Duration::from_secs(1);

/// Default ceiling on the pre-jitter delay.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(30);

// 2^31 units is far beyond any sane ceiling.
const MAX_SHIFT: u32 = 31;

/// Delay for `attempt` using the default one-second unit.
pub fn delay(attempt: u32, ceiling: Duration) -> Duration {
    delay_with_base(attempt, DEFAULT_BASE, ceiling)
}

/// Delay for `attempt` with an explicit time unit.
///
/// `attempt` is coerced to at least 1.
pub fn delay_with_base(attempt: u32, base: Duration, ceiling: Duration) -> Duration {
    let clamped = clamped_delay(attempt, base, ceiling);
    let third = clamped / 3;
    if third.is_zero() {
        return clamped;
    }

    let mut rng = rand::thread_rng();
    let bound = u64::try_from(third.as_nanos()).unwrap_or(u64::MAX);
    let jitter = Duration::from_nanos(rng.gen_range(0..bound));
    if rng.gen_bool(0.5) {
        clamped - jitter
    } else {
        clamped + jitter
    }
}

/// Pre-jitter delay: `base * 2^(attempt-1)` clamped to `ceiling`.
pub fn clamped_delay(attempt: u32, base: Duration, ceiling: Duration) -> Duration {
    let shift = attempt.max(1).saturating_sub(1).min(MAX_SHIFT);
    base.checked_mul(1u32 << shift)
        .unwrap_or(ceiling)
        .min(ceiling)
}
