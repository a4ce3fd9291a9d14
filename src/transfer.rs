use crate::date::day_key;
use crate::models::{AppData, Settings};
use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import file is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("import file has no \"habits\" list")]
    MissingHabits,
    #[error("import file has invalid habit data: {0}")]
    InvalidHabits(#[source] serde_json::Error),
}

pub fn export_file_name(today: NaiveDate) -> String {
    format!("habit-tracker-export-{}.json", day_key(today))
}

/// Pretty JSON of the whole data set. Legacy log fields are not modelled, so
/// they never reach an export.
pub fn export_json(data: &AppData) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

/// Parses an import file. A file without settings keeps `current`'s settings.
pub fn import_json(current: &AppData, raw: &[u8]) -> Result<AppData, ImportError> {
    let mut value: serde_json::Value = serde_json::from_slice(raw).map_err(ImportError::Malformed)?;
    let object = value.as_object_mut().ok_or(ImportError::MissingHabits)?;
    let habits = match object.remove("habits") {
        Some(habits @ serde_json::Value::Array(_)) => habits,
        _ => return Err(ImportError::MissingHabits),
    };

    let habits = serde_json::from_value(habits).map_err(ImportError::InvalidHabits)?;
    let settings = match object.remove("settings") {
        Some(settings) => serde_json::from_value::<Settings>(settings).unwrap_or_else(|err| {
            tracing::warn!("ignoring unreadable settings in import: {err}");
            current.settings.clone()
        }),
        None => current.settings.clone(),
    };

    Ok(AppData { habits, settings })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Theme, WeekStart};

    #[test]
    fn rejects_habits_that_are_not_a_list() {
        let current = AppData::default();
        let err = import_json(&current, br#"{"habits":"not-an-array"}"#).unwrap_err();
        assert!(matches!(err, ImportError::MissingHabits));
        assert!(matches!(import_json(&current, b"[]"), Err(ImportError::MissingHabits)));
        assert!(matches!(import_json(&current, b"{"), Err(ImportError::Malformed(_))));
        assert!(matches!(
            import_json(&current, br#"{"habits":[{"title":1}]}"#),
            Err(ImportError::InvalidHabits(_))
        ));
    }

    #[test]
    fn missing_settings_keep_current_ones() {
        let mut current = AppData::default();
        current.settings.theme = Theme::Dark;
        let imported = import_json(&current, br#"{"habits":[]}"#).unwrap();
        assert_eq!(imported.settings.theme, Theme::Dark);

        let imported =
            import_json(&current, br#"{"habits":[],"settings":{"weekStart":"sunday"}}"#).unwrap();
        assert_eq!(imported.settings.week_start, WeekStart::Sunday);
        assert_eq!(imported.settings.theme, Theme::System);
    }

    #[test]
    fn export_strips_legacy_fields() {
        let raw = br##"{"habits":[{"id":"h","title":"Walk","color":"#22c55e",
            "createdAt":"2024-01-01T00:00:00Z","archived":false,
            "logs":{"2024-01-02":{"date":"2024-01-02","completed":true,"rating":5,"color":"#fff"}}}]}"##;
        let data = import_json(&AppData::default(), raw).unwrap();
        let exported = export_json(&data).unwrap();
        assert!(!exported.contains("rating"));
        assert!(exported.contains("\"2024-01-02\""));
        assert_eq!(
            export_file_name(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            "habit-tracker-export-2024-06-01.json"
        );
    }
}
