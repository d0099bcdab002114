//! imgshift API Library
//!
//! HTTP handlers, error rendering and application setup for the conversion service.

mod api_doc;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;
mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
