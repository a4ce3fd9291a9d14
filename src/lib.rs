pub mod app;
pub mod backup;
pub mod calendar;
pub mod config;
pub mod date;
pub mod errors;
pub mod gesture;
pub mod handlers;
pub mod models;
pub mod mutations;
pub mod persisted;
pub mod state;
pub mod stats;
pub mod storage;
pub mod transfer;

pub use app::router;
pub use config::Config;
pub use state::AppState;
