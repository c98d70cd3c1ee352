pub mod config;
pub mod error;
pub mod format;
pub mod render_models;
pub mod state;
