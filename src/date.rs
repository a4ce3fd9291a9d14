use crate::models::WeekStart;
use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, Utc, Weekday};

/// The current day and instant, passed explicitly so the core stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    pub today: NaiveDate,
    pub now: DateTime<Utc>,
}

impl Clock {
    pub fn system() -> Self {
        let local = Local::now();
        Self {
            today: local.date_naive(),
            now: local.with_timezone(&Utc),
        }
    }

    pub fn at(today: NaiveDate, now: DateTime<Utc>) -> Self {
        Self { today, now }
    }
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_day(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d").ok()
}

impl WeekStart {
    pub fn first_weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sun,
            WeekStart::Monday => Weekday::Mon,
        }
    }

    /// Position of `day` within a week starting on this weekday, 0..=6.
    pub fn offset_of(self, day: Weekday) -> u32 {
        match self {
            WeekStart::Sunday => day.num_days_from_sunday(),
            WeekStart::Monday => day.num_days_from_monday(),
        }
    }
}

pub fn week_start(date: NaiveDate, start: WeekStart) -> NaiveDate {
    date - Duration::days(i64::from(start.offset_of(date.weekday())))
}

pub fn week_end(date: NaiveDate, start: WeekStart) -> NaiveDate {
    week_start(date, start) + Duration::days(6)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    let first = first_of_month(date);
    match first.checked_add_months(Months::new(1)) {
        Some(next) => next - Duration::days(1),
        None => first,
    }
}

/// First day of the month `delta` months away from `date`'s month.
pub fn shift_month(date: NaiveDate, delta: i32) -> NaiveDate {
    let first = first_of_month(date);
    let months = Months::new(delta.unsigned_abs());
    let shifted = if delta >= 0 {
        first.checked_add_months(months)
    } else {
        first.checked_sub_months(months)
    };
    shifted.unwrap_or(first)
}

pub fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}
