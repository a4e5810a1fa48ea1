//! xrdeck API Library
//!
//! HTTP surface of the ingestion service: the XR archive import endpoint with
//! its rate-limit gate and event-stream response, the health route, and
//! application setup.

mod api_doc;
pub mod constants;
mod handlers;
mod middleware;
pub mod setup;
mod utils;

pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
