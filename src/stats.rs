use crate::date::{day_key, parse_day};
use crate::models::Habit;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyPoint {
    pub date: String,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitSummary {
    pub habit_id: String,
    pub title: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_completions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub date: String,
    pub total_habits: usize,
    pub completed_today: usize,
    pub completion_rate: u8,
    pub streak: u32,
    pub last_7_days: Vec<DailyPoint>,
    pub habits: Vec<HabitSummary>,
}

/// Archived habits are skipped.
pub fn build_stats_at<'a>(
    today: NaiveDate,
    habits: impl IntoIterator<Item = &'a Habit>,
) -> DashboardStats {
    let active: Vec<&Habit> = habits.into_iter().filter(|habit| !habit.archived).collect();
    let total = active.len();

    let completed_today = active.iter().filter(|habit| habit.completed_on(today)).count();

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        last_7_days.push(DailyPoint {
            date: day_key(date),
            completed: active.iter().filter(|habit| habit.completed_on(date)).count(),
            total,
        });
    }

    let habits = active
        .iter()
        .map(|habit| {
            let days = completed_days([*habit]);
            HabitSummary {
                habit_id: habit.id.clone(),
                title: habit.title.clone(),
                current_streak: current_streak(&days, today),
                longest_streak: longest_streak(&days),
                total_completions: days.len(),
            }
        })
        .collect();

    DashboardStats {
        date: day_key(today),
        total_habits: total,
        completed_today,
        completion_rate: completion_rate(completed_today, total),
        streak: current_streak(&completed_days(active.iter().copied()), today),
        last_7_days,
        habits,
    }
}

/// Percentage rounded half up; zero when there is nothing to complete.
pub fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 200 + total) / (total * 2)) as u8
}

/// Every day on which at least one of `habits` was completed.
pub fn completed_days<'a>(habits: impl IntoIterator<Item = &'a Habit>) -> BTreeSet<NaiveDate> {
    habits
        .into_iter()
        .flat_map(|habit| habit.logs.iter())
        .filter(|(_, log)| log.completed)
        .filter_map(|(key, _)| parse_day(key))
        .collect()
}

/// Consecutive active days ending today, or ending yesterday when today has
/// no activity yet.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today - Duration::days(1);
    let mut cursor = if days.contains(&today) {
        today
    } else if days.contains(&yesterday) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }
    longest
}
