//! Integration test modules.

mod common;
mod config;
mod notifications;
mod sharing;
mod workflows;
