//! Bucketing of a habit's logs into heatmap rows and month grids.

use crate::date::{
    day_key, days_inclusive, first_of_month, last_of_month, same_month, shift_month, week_end,
    week_start,
};
use crate::models::{DailyLog, WeekStart};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Days shown by the heatmap before snapping to the week start.
pub const HEATMAP_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub completed: bool,
    pub note: Option<String>,
    pub is_today: bool,
    /// Days after today can never be selected or toggled.
    pub selectable: bool,
}

impl DayCell {
    fn build(date: NaiveDate, logs: &BTreeMap<String, DailyLog>, today: NaiveDate) -> Self {
        let log = logs.get(&day_key(date));
        Self {
            date,
            completed: log.is_some_and(|log| log.completed),
            note: log.and_then(|log| log.note.clone()),
            is_today: date == today,
            selectable: date <= today,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HeatmapCell {
    Placeholder,
    Day(DayCell),
}

impl HeatmapCell {
    pub fn day(&self) -> Option<&DayCell> {
        match self {
            HeatmapCell::Day(cell) => Some(cell),
            HeatmapCell::Placeholder => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Heatmap {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub split_months: bool,
    /// Each row is one week of 7 slots, in calendar order.
    pub rows: Vec<Vec<HeatmapCell>>,
}

pub fn build_heatmap(
    logs: &BTreeMap<String, DailyLog>,
    today: NaiveDate,
    start_of_week: WeekStart,
    split_months: bool,
) -> Heatmap {
    let start = week_start(today - Duration::days(HEATMAP_DAYS - 1), start_of_week);

    let mut rows = Vec::new();
    let mut row: Vec<HeatmapCell> = Vec::with_capacity(7);
    let mut previous: Option<NaiveDate> = None;

    for date in days_inclusive(start, today) {
        let new_month = previous.is_some_and(|prev| !same_month(prev, date));
        if split_months && new_month && !row.is_empty() {
            row.resize(7, HeatmapCell::Placeholder);
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(7)));
            let offset = start_of_week.offset_of(date.weekday()) as usize;
            row.resize(offset, HeatmapCell::Placeholder);
        }

        row.push(HeatmapCell::Day(DayCell::build(date, logs, today)));
        if row.len() == 7 {
            rows.push(std::mem::replace(&mut row, Vec::with_capacity(7)));
        }
        previous = Some(date);
    }

    if !row.is_empty() {
        row.resize(7, HeatmapCell::Placeholder);
        rows.push(row);
    }

    Heatmap {
        start,
        end: today,
        split_months,
        rows,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthCell {
    #[serde(flatten)]
    pub day: DayCell,
    pub in_month: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<Vec<MonthCell>>,
    pub can_go_next: bool,
}

impl MonthGrid {
    pub fn cells(&self) -> impl Iterator<Item = &MonthCell> {
        self.weeks.iter().flatten()
    }
}

/// Full weeks covering the month that contains `anchor`.
pub fn build_month_grid(
    logs: &BTreeMap<String, DailyLog>,
    anchor: NaiveDate,
    today: NaiveDate,
    start_of_week: WeekStart,
) -> MonthGrid {
    let first = first_of_month(anchor);
    let last = last_of_month(anchor);
    let grid_start = week_start(first, start_of_week);
    let grid_end = week_end(last, start_of_week);

    let cells: Vec<MonthCell> = days_inclusive(grid_start, grid_end)
        .map(|date| MonthCell {
            day: DayCell::build(date, logs, today),
            in_month: same_month(date, anchor),
        })
        .collect();

    MonthGrid {
        year: first.year(),
        month: first.month(),
        weeks: cells.chunks(7).map(<[MonthCell]>::to_vec).collect(),
        can_go_next: shift_month(first, 1) <= today,
    }
}

/// Which month the calendar shows. Browsing never moves past the month that
/// contains today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthView {
    month: NaiveDate,
}

impl MonthView {
    pub fn new(selected: NaiveDate) -> Self {
        Self {
            month: first_of_month(selected),
        }
    }

    pub fn month(&self) -> NaiveDate {
        self.month
    }

    pub fn prev_month(&mut self) {
        self.month = shift_month(self.month, -1);
    }

    /// Returns false and stays put when the next month starts after `today`.
    pub fn next_month(&mut self, today: NaiveDate) -> bool {
        let candidate = shift_month(self.month, 1);
        if candidate > today {
            return false;
        }
        self.month = candidate;
        true
    }

    /// Follows an externally changed selection to its month.
    pub fn sync_to_selection(&mut self, selected: NaiveDate) {
        if !same_month(selected, self.month) {
            self.month = first_of_month(selected);
        }
    }

    /// Click selection. Future days are rejected.
    pub fn select(&mut self, day: NaiveDate, today: NaiveDate) -> Option<NaiveDate> {
        if day > today {
            return None;
        }
        self.sync_to_selection(day);
        Some(day)
    }
}
