use crate::calendar::{Heatmap, MonthGrid, build_heatmap, build_month_grid};
use crate::date::{Clock, day_key};
use crate::errors::AppError;
use crate::models::{
    AppData, ArchiveRequest, BackupResponse, CalendarQuery, CreateHabitRequest, Habit, HabitColor,
    LogResponse, MoveRequest, NoteRequest, Settings, UpdateHabitRequest,
};
use crate::mutations;
use crate::state::AppState;
use crate::stats::{DashboardStats, build_stats_at};
use crate::transfer::{export_file_name, export_json, import_json};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::info;

pub async fn get_data(State(state): State<AppState>) -> Json<AppData> {
    Json(state.snapshot().await)
}

pub async fn get_stats(State(state): State<AppState>) -> Json<DashboardStats> {
    let data = state.data.lock().await;
    Json(build_stats_at(Clock::system().today, &data.get().habits))
}

fn parse_color(color: Option<&str>) -> Result<HabitColor, AppError> {
    match color {
        None => Ok(HabitColor::default()),
        Some(raw) => HabitColor::parse(raw)
            .ok_or_else(|| AppError::bad_request(format!("color {raw:?} is not in the palette"))),
    }
}

fn find_habit(data: &AppData, habit_id: &str) -> Result<Habit, AppError> {
    data.habit(habit_id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("habit {habit_id} not found")))
}

async fn require_habit(state: &AppState, habit_id: &str) -> Result<(), AppError> {
    find_habit(state.data.lock().await.get(), habit_id).map(|_| ())
}

pub async fn create_habit(
    State(state): State<AppState>,
    Json(payload): Json<CreateHabitRequest>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let color = parse_color(payload.color.as_deref())?;
    if payload.title.trim().is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let clock = Clock::system();
    let mut created = None;
    let data = state
        .update(|data| {
            let (next, id) = mutations::create_habit(data, &payload.title, color, &clock);
            created = id;
            next
        })
        .await;

    let id = created.ok_or_else(|| AppError::bad_request("title must not be empty"))?;
    info!("created habit {id}");
    Ok((StatusCode::CREATED, Json(find_habit(&data, &id)?)))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Json(payload): Json<UpdateHabitRequest>,
) -> Result<Json<Habit>, AppError> {
    let current = find_habit(&state.snapshot().await, &habit_id)?;
    if payload.title.trim().is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    let color = match payload.color.as_deref() {
        Some(raw) => parse_color(Some(raw))?,
        None => current.color,
    };

    let data = state
        .update(|data| mutations::update_habit(data, &habit_id, &payload.title, color))
        .await;
    Ok(Json(find_habit(&data, &habit_id)?))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_habit(&state, &habit_id).await?;
    state
        .update(|data| mutations::delete_habit(data, &habit_id))
        .await;
    info!("deleted habit {habit_id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Json(payload): Json<ArchiveRequest>,
) -> Result<Json<Habit>, AppError> {
    require_habit(&state, &habit_id).await?;
    let data = state
        .update(|data| mutations::set_archived(data, &habit_id, payload.archived))
        .await;
    Ok(Json(find_habit(&data, &habit_id)?))
}

pub async fn move_habit(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Json(payload): Json<MoveRequest>,
) -> Result<Json<AppData>, AppError> {
    require_habit(&state, &habit_id).await?;
    let data = state
        .update(|data| mutations::move_habit(data, &habit_id, payload.index))
        .await;
    Ok(Json(data))
}

fn log_response(data: &AppData, habit_id: &str, day: NaiveDate) -> Result<LogResponse, AppError> {
    let habit = find_habit(data, habit_id)?;
    Ok(LogResponse {
        habit_id: habit_id.to_string(),
        date: day_key(day),
        log: habit.log_on(day).cloned(),
    })
}

fn reject_future(day: NaiveDate, clock: &Clock) -> Result<(), AppError> {
    if day > clock.today {
        return Err(AppError::bad_request(format!("{day} is in the future")));
    }
    Ok(())
}

pub async fn toggle_log(
    State(state): State<AppState>,
    Path((habit_id, day)): Path<(String, NaiveDate)>,
) -> Result<Json<LogResponse>, AppError> {
    require_habit(&state, &habit_id).await?;
    let clock = Clock::system();
    reject_future(day, &clock)?;
    let data = state
        .update(|data| mutations::toggle_completion(data, &habit_id, day, &clock))
        .await;
    Ok(Json(log_response(&data, &habit_id, day)?))
}

pub async fn save_note(
    State(state): State<AppState>,
    Path((habit_id, day)): Path<(String, NaiveDate)>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<LogResponse>, AppError> {
    require_habit(&state, &habit_id).await?;
    let clock = Clock::system();
    reject_future(day, &clock)?;
    let data = state
        .update(|data| {
            mutations::save_note_forcing_completion(data, &habit_id, day, &payload.note, &clock)
        })
        .await;
    Ok(Json(log_response(&data, &habit_id, day)?))
}

pub async fn save_annotation(
    State(state): State<AppState>,
    Path((habit_id, day)): Path<(String, NaiveDate)>,
    Json(payload): Json<NoteRequest>,
) -> Result<Json<LogResponse>, AppError> {
    require_habit(&state, &habit_id).await?;
    let clock = Clock::system();
    reject_future(day, &clock)?;
    let data = state
        .update(|data| mutations::save_note_if_noteworthy(data, &habit_id, day, &payload.note, &clock))
        .await;
    Ok(Json(log_response(&data, &habit_id, day)?))
}

pub async fn delete_log(
    State(state): State<AppState>,
    Path((habit_id, day)): Path<(String, NaiveDate)>,
) -> Result<Json<LogResponse>, AppError> {
    require_habit(&state, &habit_id).await?;
    let data = state
        .update(|data| mutations::delete_log(data, &habit_id, day))
        .await;
    Ok(Json(log_response(&data, &habit_id, day)?))
}

pub async fn get_heatmap(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
) -> Result<Json<Heatmap>, AppError> {
    let data = state.snapshot().await;
    let habit = find_habit(&data, &habit_id)?;
    let settings = &data.settings;
    Ok(Json(build_heatmap(
        &habit.logs,
        Clock::system().today,
        settings.week_start,
        settings.split_months,
    )))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Path(habit_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<MonthGrid>, AppError> {
    let data = state.snapshot().await;
    let habit = find_habit(&data, &habit_id)?;
    let today = Clock::system().today;
    let anchor = query.month.unwrap_or(today);
    Ok(Json(build_month_grid(
        &habit.logs,
        anchor,
        today,
        data.settings.week_start,
    )))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.snapshot().await.settings)
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Json<Settings> {
    let data = state
        .update(|data| mutations::update_settings(data, settings))
        .await;
    Json(data.settings)
}

pub async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let data = state.snapshot().await;
    let body = export_json(&data).map_err(AppError::internal)?;
    let file_name = export_file_name(Clock::system().today);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

pub async fn import(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AppData>, AppError> {
    let current = state.snapshot().await;
    let imported = import_json(&current, &body)?;
    info!("imported {} habits", imported.habits.len());
    Ok(Json(state.replace(imported).await))
}

pub async fn backup(State(state): State<AppState>) -> Result<Json<BackupResponse>, AppError> {
    let report = state.backup_now().await?;
    Ok(Json(BackupResponse {
        file: report.file,
        deleted: report.deleted,
        failed_deletes: report.failed_deletes,
    }))
}
