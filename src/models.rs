use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accent colors a habit can be created with.
pub const PALETTE: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6", "#ec4899",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyLog {
    pub date: String,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl DailyLog {
    pub fn has_note(&self) -> bool {
        self.note.as_deref().is_some_and(|note| !note.trim().is_empty())
    }

    /// An entry that is neither completed nor annotated must not be stored.
    pub fn is_empty(&self) -> bool {
        !self.completed && !self.has_note()
    }
}

/// A palette token. Stored data may carry tokens outside [`PALETTE`]; those
/// are kept as-is on read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct HabitColor(String);

impl HabitColor {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        PALETTE
            .iter()
            .find(|token| **token == value)
            .map(|token| Self((*token).to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HabitColor {
    fn default() -> Self {
        Self(PALETTE[3].to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub color: HabitColor,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub logs: BTreeMap<String, DailyLog>,
    #[serde(default)]
    pub archived: bool,
}

impl Habit {
    pub fn log_on(&self, day: NaiveDate) -> Option<&DailyLog> {
        self.logs.get(&crate::date::day_key(day))
    }

    pub fn completed_on(&self, day: NaiveDate) -> bool {
        self.log_on(day).is_some_and(|log| log.completed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    #[default]
    Monday,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WebDavConfig {
    pub enabled: bool,
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    pub backup_count: usize,
    pub auto_sync: bool,
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            username: String::new(),
            password: String::new(),
            proxy_url: None,
            backup_count: 10,
            auto_sync: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub language: Language,
    pub week_start: WeekStart,
    pub split_months: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_dav: Option<WebDavConfig>,
}

impl Settings {
    /// The backup config, only when present and switched on.
    pub fn active_backup(&self) -> Option<&WebDavConfig> {
        self.web_dav.as_ref().filter(|config| config.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppData {
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub settings: Settings,
}

impl AppData {
    pub fn habit(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == habit_id)
    }

    pub fn active_habits(&self) -> impl Iterator<Item = &Habit> {
        self.habits.iter().filter(|habit| !habit.archived)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateHabitRequest {
    pub title: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHabitRequest {
    pub title: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogResponse {
    pub habit_id: String,
    pub date: String,
    pub log: Option<DailyLog>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupResponse {
    pub file: String,
    pub deleted: usize,
    pub failed_deletes: usize,
}
