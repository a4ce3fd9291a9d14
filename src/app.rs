use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post, put},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", get(handlers::get_data))
        .route("/api/stats", get(handlers::get_stats))
        .route("/api/habits", post(handlers::create_habit))
        .route(
            "/api/habits/:id",
            put(handlers::update_habit).delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/archive", post(handlers::archive_habit))
        .route("/api/habits/:id/move", post(handlers::move_habit))
        .route("/api/habits/:id/heatmap", get(handlers::get_heatmap))
        .route("/api/habits/:id/calendar", get(handlers::get_calendar))
        .route(
            "/api/habits/:id/logs/:date",
            axum::routing::delete(handlers::delete_log),
        )
        .route("/api/habits/:id/logs/:date/toggle", post(handlers::toggle_log))
        .route("/api/habits/:id/logs/:date/note", put(handlers::save_note))
        .route(
            "/api/habits/:id/logs/:date/annotation",
            put(handlers::save_annotation),
        )
        .route(
            "/api/settings",
            get(handlers::get_settings).put(handlers::put_settings),
        )
        .route("/api/export", get(handlers::export))
        .route("/api/import", post(handlers::import))
        .route("/api/backup", post(handlers::backup))
        .with_state(state)
}
