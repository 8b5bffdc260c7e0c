//! Turn admission control
//!
//! Every turn endpoint fans out to paid speech and language services, so
//! `/transcribe`, `/ask` and `/turn` draw from one shared budget of turns per
//! minute across all sessions. Selection and playback routes are never limited.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use super::{ApiError, ApiState};

/// Process-wide turn budget
pub type TurnLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Budget of `turns_per_minute` turns, refilled evenly over the minute.
/// Zero is treated as one.
#[must_use]
pub fn turn_limiter(turns_per_minute: u32) -> TurnLimiter {
    let per_minute = NonZeroU32::new(turns_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Take one turn from the budget, or report how long until the next is available
pub fn admit(limiter: &TurnLimiter) -> Result<(), Duration> {
    limiter
        .check()
        .map_err(|not_until| not_until.wait_time_from(DefaultClock::default().now()))
}

/// Reject turns beyond the configured budget with `429` and `Retry-After`
pub async fn limit_turns(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(limiter) = &state.rate_limiter {
        if let Err(wait) = admit(limiter) {
            tracing::warn!(
                path = %req.uri().path(),
                retry_after_ms = wait.as_millis(),
                "turn budget exhausted"
            );
            return Err(ApiError::RateLimited(wait));
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_admits_then_asks_caller_to_wait() {
        let limiter = turn_limiter(2);
        assert!(admit(&limiter).is_ok());
        assert!(admit(&limiter).is_ok());

        let wait = admit(&limiter).unwrap_err();
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(30));
    }

    #[test]
    fn test_zero_budget_admits_one_turn() {
        let limiter = turn_limiter(0);
        assert!(admit(&limiter).is_ok());
        assert!(admit(&limiter).is_err());
    }
}
