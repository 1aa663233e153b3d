use std::{fmt, sync::Arc};

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::Serialize;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaWindow {
    pub year: i32,
    pub month: u32,
}

impl QuotaWindow {
    fn containing(now: DateTime<Utc>, tz: Tz) -> Self {
        let local = now.with_timezone(&tz);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }
}

impl fmt::Display for QuotaWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaSnapshot {
    pub window: QuotaWindow,
    pub used: u32,
    pub quota: u32,
}

#[derive(Debug)]
struct RateLimitState {
    window: QuotaWindow,
    used: u32,
}

/// Calendar-month request budget shared by every evaluation in the process.
pub struct MonthlyQuota {
    quota: u32,
    tz: Tz,
    clock: Clock,
    state: Mutex<RateLimitState>,
}

impl MonthlyQuota {
    pub fn new(quota: u32, tz: Tz, clock: Clock) -> Self {
        let window = QuotaWindow::containing(clock(), tz);
        Self {
            quota,
            tz,
            clock,
            state: Mutex::new(RateLimitState { window, used: 0 }),
        }
    }

    /// Rolls the window over if the month changed, then reserves one request.
    /// Both steps happen under a single lock so concurrent callers cannot
    /// overspend the budget.
    pub fn try_acquire(&self) -> bool {
        let current = QuotaWindow::containing((self.clock)(), self.tz);
        let mut state = self.state.lock();
        if state.window != current {
            tracing::info!(
                target: "classifier",
                previous = %state.window,
                current = %current,
                used = state.used,
                "quota window rolled over"
            );
            state.window = current;
            state.used = 0;
        }
        if state.used >= self.quota {
            return false;
        }
        state.used += 1;
        true
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        let state = self.state.lock();
        QuotaSnapshot {
            window: state.window,
            used: state.used,
            quota: self.quota,
        }
    }
}
