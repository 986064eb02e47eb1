//! Trading cycle window arithmetic
//!
//! A cycle is a fixed 24-hour accounting window with a configured cutover
//! hour (UTC). Every loop derives windows from wall-clock time through this
//! module, so independently scheduled tasks can never disagree about which
//! cycle an instant belongs to.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

/// One 24-hour trading cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Calendar date identifying the cycle (the date of its end instant)
    pub date: NaiveDate,
}

impl CycleWindow {
    /// The window containing `now`. Always satisfies `start <= now < end`
    /// and `end - start == 24h`.
    pub fn containing(now: DateTime<Utc>, cutover_hour: u32) -> Self {
        let cutover = NaiveTime::from_hms_opt(cutover_hour, 0, 0)
            .unwrap_or(NaiveTime::MIN);

        let start_date = if now.hour() >= cutover_hour {
            now.date_naive()
        } else {
            now.date_naive() - Duration::days(1)
        };

        let start = Utc.from_utc_datetime(&start_date.and_time(cutover));
        let end = start + Duration::days(1);

        Self {
            start,
            end,
            date: end.date_naive(),
        }
    }

    /// The most recently completed window as of `now`.
    ///
    /// This is the containing window shifted back one day, so a finalizer
    /// waking up at any point after the cutover (including hours late after
    /// a restart) still resolves the same closed cycle.
    pub fn last_closed(now: DateTime<Utc>, cutover_hour: u32) -> Self {
        let current = Self::containing(now, cutover_hour);
        let start = current.start - Duration::days(1);
        Self {
            start,
            end: current.start,
            date: current.start.date_naive(),
        }
    }

    /// The window whose cycle date is `date`
    pub fn for_date(date: NaiveDate, cutover_hour: u32) -> Self {
        let cutover = NaiveTime::from_hms_opt(cutover_hour, 0, 0)
            .unwrap_or(NaiveTime::MIN);
        let end = Utc.from_utc_datetime(&date.and_time(cutover));
        Self {
            start: end - Duration::days(1),
            end,
            date,
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }

    /// Time left until the window closes, as fractional hours (never negative)
    pub fn hours_remaining(&self, now: DateTime<Utc>) -> f64 {
        let secs = (self.end - now).num_seconds();
        (secs.max(0) as f64) / 3600.0
    }
}
