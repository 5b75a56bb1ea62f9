//! Farnsworth Server Library
//!
//! Self-hosted media library: chunked ZIP uploads are reassembled,
//! extracted under the media root and cataloged. The binary in main.rs
//! wires these modules into an HTTP server.
//!
//! # Modules
//!
//! - `upload`: chunk staging, reassembly and archive extraction
//! - `library`: upload orchestration and the catalog backends
//! - `db`: SQLite document store
//! - `auth`: Basic login and bearer tokens
//! - `routes`: the axum router

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod library;
pub mod logging;
pub mod routes;
pub mod state;
pub mod upload;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
