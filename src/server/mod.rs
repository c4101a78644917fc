//! HTTP server.
//!
//! This module provides:
//! - The axum [`router`] with every API route
//! - Caller extraction from the `x-api-key` header
//! - Error to response mapping
//! - The TCP transport with graceful shutdown
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use flowhub::config::Config;
//! use flowhub::server::{serve, AppState, TransportConfig};
//! use flowhub::storage::SqliteStorage;
//! use flowhub::toolshed::InstalledToolbox;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let storage = SqliteStorage::new(&config.database_path).await?;
//! let transport = TransportConfig::new(config.bind_address);
//! let state = AppState::new(storage, Arc::new(InstalledToolbox::default()), config);
//! serve(state, &transport).await?;
//! # Ok(())
//! # }
//! ```

mod auth;
pub mod handlers;
mod responses;
mod transport;
mod types;

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Extension, Router};

pub use responses::{ApiJson, ApiQuery, ErrorBody};
pub use transport::{serve, serve_with_shutdown, TransportConfig};
pub use types::AppState;

use crate::storage::ItemType;

const SHAREABLE: [ItemType; 4] = [
    ItemType::History,
    ItemType::Workflow,
    ItemType::Page,
    ItemType::Visualization,
];

/// Build the API router over `state`.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/users", post(handlers::users::create_user))
        .route("/users/current", get(handlers::users::current_user))
        .route(
            "/workflows",
            get(handlers::workflows::index).post(handlers::workflows::create),
        )
        .route(
            "/workflows/menu",
            get(handlers::workflows::get_menu).put(handlers::workflows::set_menu),
        )
        .route(
            "/workflows/{id}",
            put(handlers::workflows::update).delete(handlers::workflows::delete),
        )
        .route(
            "/workflows/{id}/undelete",
            post(handlers::workflows::undelete),
        )
        .route(
            "/workflows/{id}/versions",
            get(handlers::workflows::versions),
        )
        .route("/workflows/{id}/counts", get(handlers::workflows::counts))
        .route("/histories", post(handlers::sharing::create_history))
        .route("/pages", post(handlers::sharing::create_page))
        .route(
            "/visualizations",
            post(handlers::sharing::create_visualization),
        )
        .route(
            "/notifications",
            get(handlers::notifications::list)
                .post(handlers::notifications::send)
                .put(handlers::notifications::update_many),
        )
        .route(
            "/notifications/status",
            get(handlers::notifications::status),
        )
        .route(
            "/notifications/preferences",
            get(handlers::notifications::get_preferences)
                .put(handlers::notifications::update_preferences),
        )
        .route(
            "/notifications/broadcast",
            get(handlers::notifications::list_broadcasts)
                .post(handlers::notifications::create_broadcast),
        )
        .route(
            "/notifications/broadcast/{id}",
            get(handlers::notifications::get_broadcast),
        )
        .route(
            "/notifications/{id}",
            get(handlers::notifications::get_one)
                .put(handlers::notifications::update_one)
                .delete(handlers::notifications::delete_one),
        );

    for item_type in SHAREABLE {
        router = router.merge(sharing_routes(item_type));
    }

    router
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

fn sharing_routes(item_type: ItemType) -> Router<AppState> {
    let base = format!("/{}/{{id}}", item_type.collection());
    Router::new()
        .route(
            &format!("{base}/share_with_users"),
            put(handlers::sharing::share_with_users),
        )
        .route(
            &format!("{base}/sharing"),
            get(handlers::sharing::sharing_status),
        )
        .layer(Extension(item_type))
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis(),
        "request"
    );
    response
}
