//! mmsim application: configuration, backend wiring and the run loop.

pub mod app;
pub mod backends;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
