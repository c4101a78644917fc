//! Request handlers, one module per resource.
//!
//! Handlers only extract, delegate to a service and wrap the result; all
//! access control lives in the services.

pub mod notifications;
pub mod sharing;
pub mod users;
pub mod workflows;

use axum::Json;
use serde_json::{json, Value};

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}
