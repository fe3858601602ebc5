use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Recurring Schedule
// ============================================================================
//
//   daily@HH:MM      once a day at a UTC wall-clock time
//   every:<n>ms|s|m|h   fixed interval, first run one interval after start
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily(NaiveTime),
    Every(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schedule {input:?}: {reason}")]
pub struct ScheduleParseError {
    pub input: String,
    pub reason: &'static str,
}

impl Schedule {
    /// Time from `now` until the next run.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        match self {
            Schedule::Every(interval) => *interval,
            Schedule::Daily(at) => {
                let today = now.date_naive().and_time(*at).and_utc();
                let next = if today > now {
                    today
                } else {
                    today + ChronoDuration::days(1)
                };
                (next - now).to_std().unwrap_or(Duration::ZERO)
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let fail = |reason| ScheduleParseError {
            input: input.to_string(),
            reason,
        };

        if let Some(time) = input.strip_prefix("daily@") {
            let at = NaiveTime::parse_from_str(time, "%H:%M")
                .map_err(|_| fail("expected daily@HH:MM"))?;
            return Ok(Schedule::Daily(at));
        }

        if let Some(interval) = input.strip_prefix("every:") {
            let (amount, millis_per_unit) = if let Some(amount) = interval.strip_suffix("ms") {
                (amount, 1)
            } else if let Some(amount) = interval.strip_suffix('s') {
                (amount, 1_000)
            } else if let Some(amount) = interval.strip_suffix('m') {
                (amount, 60_000)
            } else if let Some(amount) = interval.strip_suffix('h') {
                (amount, 3_600_000)
            } else {
                return Err(fail("unit must be ms, s, m or h"));
            };
            let amount: u64 = amount.parse().map_err(|_| fail("interval must be a whole number"))?;
            if amount == 0 {
                return Err(fail("interval must be positive"));
            }
            return Ok(Schedule::Every(Duration::from_millis(
                amount.saturating_mul(millis_per_unit),
            )));
        }

        Err(fail("expected daily@HH:MM or every:<n>ms|s|m|h"))
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily(at) => write!(f, "daily@{}", at.format("%H:%M")),
            Schedule::Every(interval) => {
                let millis = interval.as_millis();
                match millis {
                    m if m % 3_600_000 == 0 => write!(f, "every:{}h", m / 3_600_000),
                    m if m % 60_000 == 0 => write!(f, "every:{}m", m / 60_000),
                    m if m % 1_000 == 0 => write!(f, "every:{}s", m / 1_000),
                    m => write!(f, "every:{m}ms"),
                }
            }
        }
    }
}
