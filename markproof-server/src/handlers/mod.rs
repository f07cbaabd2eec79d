//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod embed;
pub mod extract;
pub mod health;

pub use crate::state::AppState;
pub use embed::{embed_handler, WATERMARKED_FILE_NAME};
pub use extract::{extract_handler, ExtractResponse};
pub use health::{health, ready, root, HealthResponse, ReadyResponse, RootResponse};
