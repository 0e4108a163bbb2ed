// Wall-clock source for day rollover and timestamps

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Current instant plus the platform's local calendar day
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today in the platform timezone, not UTC
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        local_day(Utc::now(), self.tz)
    }
}

/// Calendar day of `instant` in `tz`
pub fn local_day(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Clock pinned to a settable instant
    pub struct FixedClock {
        now: Mutex<DateTime<Utc>>,
        tz: Tz,
    }

    impl FixedClock {
        /// Noon local time on `day` in Asia/Ho_Chi_Minh
        pub fn on(day: NaiveDate) -> Self {
            let tz = chrono_tz::Asia::Ho_Chi_Minh;
            let now = day
                .and_hms_opt(12, 0, 0)
                .and_then(|dt| dt.and_local_timezone(tz).single())
                .map(|dt| dt.with_timezone(&Utc))
                .expect("valid local noon");
            Self {
                now: Mutex::new(now),
                tz,
            }
        }

        pub fn advance_days(&self, days: i64) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::days(days);
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn today(&self) -> NaiveDate {
            local_day(self.now(), self.tz)
        }
    }
}
