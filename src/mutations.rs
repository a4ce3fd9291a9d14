//! Pure state transitions over [`AppData`].
//!
//! Every function returns a new value and leaves its input untouched. Unknown
//! habit ids leave the data unchanged, as do days after `clock.today` for
//! everything but [`delete_log`].

use crate::date::{Clock, day_key};
use crate::models::{AppData, DailyLog, Habit, HabitColor, Settings};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use uuid::Uuid;

fn with_habit(data: &AppData, habit_id: &str, apply: impl FnOnce(&mut Habit)) -> AppData {
    let mut next = data.clone();
    if let Some(habit) = next.habits.iter_mut().find(|habit| habit.id == habit_id) {
        apply(habit);
    }
    next
}

fn with_logs(
    data: &AppData,
    habit_id: &str,
    day: NaiveDate,
    clock: &Clock,
    apply: impl FnOnce(&mut BTreeMap<String, DailyLog>, String),
) -> AppData {
    if day > clock.today {
        return data.clone();
    }
    with_habit(data, habit_id, |habit| apply(&mut habit.logs, day_key(day)))
}

fn clean_note(note: &str) -> Option<String> {
    if note.trim().is_empty() {
        None
    } else {
        Some(note.to_string())
    }
}

pub fn toggle_completion(data: &AppData, habit_id: &str, day: NaiveDate, clock: &Clock) -> AppData {
    with_logs(data, habit_id, day, clock, |logs, key| {
        match logs.get_mut(&key) {
            Some(log) if log.completed => {
                if log.has_note() {
                    log.completed = false;
                } else {
                    logs.remove(&key);
                }
            }
            Some(log) => {
                log.completed = true;
                log.timestamp = Some(clock.now);
                log.date = key;
            }
            None => {
                logs.insert(
                    key.clone(),
                    DailyLog {
                        date: key,
                        completed: true,
                        note: None,
                        timestamp: Some(clock.now),
                    },
                );
            }
        }
    })
}

/// Saves a note and treats it as a check-in.
pub fn save_note_forcing_completion(
    data: &AppData,
    habit_id: &str,
    day: NaiveDate,
    note: &str,
    clock: &Clock,
) -> AppData {
    with_logs(data, habit_id, day, clock, |logs, key| {
        let log = logs.entry(key.clone()).or_insert_with(|| DailyLog {
            date: key,
            completed: false,
            note: None,
            timestamp: None,
        });
        log.note = clean_note(note);
        log.completed = true;
        log.timestamp.get_or_insert(clock.now);
    })
}

/// Calendar annotation variant of [`save_note_forcing_completion`]: an empty
/// note on a day that is not completed leaves the data unchanged.
pub fn save_note_if_noteworthy(
    data: &AppData,
    habit_id: &str,
    day: NaiveDate,
    note: &str,
    clock: &Clock,
) -> AppData {
    let completed = data
        .habit(habit_id)
        .is_some_and(|habit| habit.completed_on(day));
    if clean_note(note).is_none() && !completed {
        return data.clone();
    }
    save_note_forcing_completion(data, habit_id, day, note, clock)
}

/// Removes the entry for `day`, future days included.
pub fn delete_log(data: &AppData, habit_id: &str, day: NaiveDate) -> AppData {
    with_habit(data, habit_id, |habit| {
        habit.logs.remove(&day_key(day));
    })
}

/// Appends a new habit. Returns the new data and the id of the created habit,
/// or `None` when the title is blank.
pub fn create_habit(
    data: &AppData,
    title: &str,
    color: HabitColor,
    clock: &Clock,
) -> (AppData, Option<String>) {
    let title = title.trim();
    if title.is_empty() {
        return (data.clone(), None);
    }

    let id = Uuid::new_v4().to_string();
    let mut next = data.clone();
    next.habits.push(Habit {
        id: id.clone(),
        title: title.to_string(),
        color,
        created_at: clock.now,
        logs: BTreeMap::new(),
        archived: false,
    });
    (next, Some(id))
}

pub fn update_habit(data: &AppData, habit_id: &str, title: &str, color: HabitColor) -> AppData {
    let title = title.trim();
    if title.is_empty() {
        return data.clone();
    }
    with_habit(data, habit_id, |habit| {
        habit.title = title.to_string();
        habit.color = color;
    })
}

pub fn delete_habit(data: &AppData, habit_id: &str) -> AppData {
    let mut next = data.clone();
    next.habits.retain(|habit| habit.id != habit_id);
    next
}

pub fn set_archived(data: &AppData, habit_id: &str, archived: bool) -> AppData {
    with_habit(data, habit_id, |habit| habit.archived = archived)
}

/// Moves a habit to `index` in display order, clamped to the last position.
pub fn move_habit(data: &AppData, habit_id: &str, index: usize) -> AppData {
    let mut next = data.clone();
    if let Some(from) = next.habits.iter().position(|habit| habit.id == habit_id) {
        let habit = next.habits.remove(from);
        let to = index.min(next.habits.len());
        next.habits.insert(to, habit);
    }
    next
}

pub fn update_settings(data: &AppData, settings: Settings) -> AppData {
    AppData {
        habits: data.habits.clone(),
        settings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn clock() -> Clock {
        Clock::at(d(2024, 6, 1), Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap())
    }

    fn with_one_habit() -> (AppData, String) {
        let (data, id) = create_habit(&AppData::default(), "Read", HabitColor::default(), &clock());
        (data, id.unwrap())
    }

    #[test]
    fn toggle_creates_then_removes_entry() {
        let (data, id) = with_one_habit();
        let day = d(2024, 6, 1);

        let checked = toggle_completion(&data, &id, day, &clock());
        let log = checked.habit(&id).unwrap().log_on(day).unwrap();
        assert_eq!(log.date, "2024-06-01");
        assert!(log.completed);
        assert_eq!(log.timestamp, Some(clock().now));
        assert!(data.habit(&id).unwrap().logs.is_empty());

        let unchecked = toggle_completion(&checked, &id, day, &clock());
        assert_eq!(unchecked, data);
    }

    #[test]
    fn uncheck_keeps_entry_that_has_a_note() {
        let (data, id) = with_one_habit();
        let day = d(2024, 5, 30);
        let noted = save_note_forcing_completion(&data, &id, day, "tired but done", &clock());
        let unchecked = toggle_completion(&noted, &id, day, &clock());

        let log = unchecked.habit(&id).unwrap().log_on(day).unwrap();
        assert!(!log.completed);
        assert_eq!(log.note.as_deref(), Some("tired but done"));

        let rechecked = toggle_completion(&unchecked, &id, day, &clock());
        let log = rechecked.habit(&id).unwrap().log_on(day).unwrap();
        assert!(log.completed);
        assert_eq!(log.note.as_deref(), Some("tired but done"));
    }

    #[test]
    fn future_days_are_immutable() {
        let (data, id) = with_one_habit();
        let tomorrow = d(2024, 6, 2);
        assert_eq!(toggle_completion(&data, &id, tomorrow, &clock()), data);
        assert_eq!(save_note_forcing_completion(&data, &id, tomorrow, "x", &clock()), data);
        assert_eq!(save_note_if_noteworthy(&data, &id, tomorrow, "x", &clock()), data);
    }

    #[test]
    fn forcing_note_keeps_existing_timestamp() {
        let (data, id) = with_one_habit();
        let day = d(2024, 6, 1);
        let checked = toggle_completion(&data, &id, day, &clock());
        let later = Clock::at(day, Utc.with_ymd_and_hms(2024, 6, 1, 21, 0, 0).unwrap());
        let noted = save_note_forcing_completion(&checked, &id, day, "evening", &later);
        let log = noted.habit(&id).unwrap().log_on(day).unwrap();
        assert_eq!(log.timestamp, Some(clock().now));
        assert_eq!(log.note.as_deref(), Some("evening"));
    }

    #[test]
    fn noteworthy_variant_skips_blank_notes_on_open_days() {
        let (data, id) = with_one_habit();
        let day = d(2024, 5, 20);
        assert_eq!(save_note_if_noteworthy(&data, &id, day, "   ", &clock()), data);

        let noted = save_note_if_noteworthy(&data, &id, day, "rest day", &clock());
        let log = noted.habit(&id).unwrap().log_on(day).unwrap();
        assert!(log.completed);
        assert_eq!(log.timestamp, Some(clock().now));
        assert_eq!(log.note.as_deref(), Some("rest day"));
        assert_eq!(
            noted,
            save_note_forcing_completion(&data, &id, day, "rest day", &clock())
        );

        let unchecked = toggle_completion(&noted, &id, day, &clock());
        assert_eq!(save_note_if_noteworthy(&unchecked, &id, day, "", &clock()), unchecked);

        let checked = toggle_completion(&data, &id, day, &clock());
        let blank = save_note_if_noteworthy(&checked, &id, day, " ", &clock());
        let log = blank.habit(&id).unwrap().log_on(day).unwrap();
        assert!(log.completed);
        assert_eq!(log.note, None);
    }

    #[test]
    fn delete_log_is_idempotent() {
        let (data, id) = with_one_habit();
        let day = d(2024, 6, 1);
        let checked = toggle_completion(&data, &id, day, &clock());
        let once = delete_log(&checked, &id, day);
        let twice = delete_log(&once, &id, day);
        assert_eq!(once, twice);
        assert_eq!(once, data);
    }

    #[test]
    fn delete_log_removes_future_dated_entries() {
        let (mut data, id) = with_one_habit();
        let ahead = d(2024, 6, 5);
        data.habits[0].logs.insert(
            day_key(ahead),
            DailyLog {
                date: day_key(ahead),
                completed: true,
                note: None,
                timestamp: Some(clock().now),
            },
        );
        let cleaned = delete_log(&data, &id, ahead);
        assert!(cleaned.habit(&id).unwrap().log_on(ahead).is_none());
    }

    #[test]
    fn unknown_habit_ids_are_no_ops() {
        let (data, _) = with_one_habit();
        let day = d(2024, 6, 1);
        assert_eq!(toggle_completion(&data, "missing", day, &clock()), data);
        assert_eq!(update_habit(&data, "missing", "x", HabitColor::default()), data);
        assert_eq!(delete_habit(&data, "missing"), data);
        assert_eq!(set_archived(&data, "missing", true), data);
        assert_eq!(move_habit(&data, "missing", 0), data);
    }

    #[test]
    fn habit_crud() {
        let (blank, none) = create_habit(&AppData::default(), "  ", HabitColor::default(), &clock());
        assert!(none.is_none());
        assert!(blank.habits.is_empty());

        let (data, id) = with_one_habit();
        let (data, second) = create_habit(&data, " Run ", HabitColor::default(), &clock());
        let second = second.unwrap();
        assert_ne!(id, second);
        assert_eq!(data.habits[1].title, "Run");
        assert!(!data.habits[1].archived);
        assert_eq!(data.habits[1].created_at, clock().now);

        let blue = HabitColor::parse("#3b82f6").unwrap();
        let checked = toggle_completion(&data, &id, d(2024, 6, 1), &clock());
        let renamed = update_habit(&checked, &id, "Read more", blue.clone());
        let habit = renamed.habit(&id).unwrap();
        assert_eq!(habit.title, "Read more");
        assert_eq!(habit.color, blue);
        assert_eq!(habit.logs.len(), 1);
        assert_eq!(update_habit(&renamed, &id, "", HabitColor::default()), renamed);

        let moved = move_habit(&renamed, &second, 0);
        assert_eq!(moved.habits[0].id, second);
        let moved = move_habit(&moved, &second, 99);
        assert_eq!(moved.habits[1].id, second);

        let archived = set_archived(&moved, &id, true);
        assert!(archived.habit(&id).unwrap().archived);

        let deleted = delete_habit(&archived, &id);
        assert!(deleted.habit(&id).is_none());
        assert_eq!(deleted.habits.len(), 1);
    }
}
