//! flowhub
//!
//! Workflow listing, missing-tool aggregation, notifications and sharing
//! for a scientific-workflow platform, served over a JSON HTTP API.
//!
//! # Features
//!
//! - Workflow index with search, sorting, paging and a `total_matches` header
//! - Missing-tool report grouped by tool-shed repository
//! - Targeted notifications, broadcasts and per-user preferences
//! - Sharing of histories, workflows, pages and visualizations
//! - Typed HTTP client for the whole API
//! - `SQLite` persistence
//!
//! # Quick Start
//!
//! ```bash
//! ID_SECRET=change-me BOOTSTRAP_ADMIN_API_KEY=admin ./flowhub
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   HTTP/JSON    ┌─────────────────┐
//! │ FlowhubClient│──────────────▶│  axum router    │──────▶ services
//! │  or browser │◀──────────────│   (x-api-key)   │
//! └─────────────┘                └────────┬────────┘
//!                                         │
//!                                         ▼
//!                                      SQLite
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod notifications;
pub mod security;
pub mod server;
pub mod sharing;
pub mod storage;
pub mod toolshed;
pub mod traits;
pub mod users;
pub mod workflows;

#[cfg(test)]
mod test_utils;
