pub mod api;
pub mod app;
pub mod config;
pub mod format;
pub mod handler;
pub mod logging;
pub mod state;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use api::{ApiError, BackendClient, BackendStatus, ChatOutcome, ChatRequest};
pub use app::App;
pub use config::Config;
pub use state::{ChatMessage, ChatRole, ChatState, ModelList, StatusLine};
