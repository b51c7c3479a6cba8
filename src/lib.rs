//! Municipal civic-engagement backend.
mod config;
mod db;
mod endpoints;
pub mod error;
mod metrics;
pub mod moderation;
mod serve;
pub mod tracking;

pub use error::Error;
pub use serve::{run, AppState, Result};

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
            _      _           _           _
  _ __ ___ (_) ___(_)_   _  __| | __ _  __| |
 | '_ ` _ \| |/ __| | | | |/ _` |/ _` |/ _` |
 | | | | | | | (__| | |_| | (_| | (_| | (_| |
 |_| |_| |_|_|\___|_|\__,_|\__,_|\__,_|\__,_|


Plataforma de participación ciudadana municipal.

API routes are under /api/
    "
}
