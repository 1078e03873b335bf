//! Daily trigger math.
//! "Every 1 day at HH:MM" in a fixed UTC offset, optionally skipping
//! Saturdays and Sundays.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Weekday};
use quizcast_core::error::{QuizError, Result};

/// Fires once per day at a fixed wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    hour: u32,
    minute: u32,
    weekdays_only: bool,
}

/// Monday through Friday, judged in the instant's own offset.
pub fn is_weekday(at: DateTime<FixedOffset>) -> bool {
    !matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}

impl DailyTrigger {
    /// Every day at `hour:00`. Hours outside 0..=23 are a config error.
    pub fn at_hour(hour: u32) -> Result<Self> {
        Self::at(hour, 0)
    }

    pub fn at(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 {
            return Err(QuizError::Config(format!("trigger hour must be in 0..=23, got {hour}")));
        }
        if minute > 59 {
            return Err(QuizError::Config(format!("trigger minute must be in 0..=59, got {minute}")));
        }
        Ok(Self {
            hour,
            minute,
            weekdays_only: false,
        })
    }

    /// Same time of day, but never on Saturday or Sunday.
    pub fn weekdays_only(mut self) -> Self {
        self.weekdays_only = true;
        self
    }

    pub fn is_weekdays_only(&self) -> bool {
        self.weekdays_only
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// First firing instant strictly after `after`, in `after`'s offset.
    pub fn next_after(&self, after: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let offset = *after.offset();
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN);
        let today = after.date_naive().and_time(time);
        let candidate = offset
            .from_local_datetime(&today)
            .single()
            .unwrap_or(after);
        let mut next = if candidate > after {
            candidate
        } else {
            candidate + Duration::days(1)
        };
        while self.weekdays_only && !is_weekday(next) {
            next += Duration::days(1);
        }
        next
    }
}

impl std::fmt::Display for DailyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "every 1 day at {:02}:{:02}", self.hour, self.minute)?;
        if self.weekdays_only {
            write!(f, " (Mon-Fri)")?;
        }
        Ok(())
    }
}
