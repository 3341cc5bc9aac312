//! Server-side models: the shared application state.

pub mod app_state;

pub use app_state::AppState;
