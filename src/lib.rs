//! Core storage library for a privacy-friendly food tracker.
//!
//! Everything lives in one encrypted SQLite file in app-private storage:
//! products with their nutrient values and the log of consumed entries.
//! [`Database`] opens the file with a key from [`keygen`], migrates the
//! schema through the versioned ladder in [`migrations`], and exposes the
//! data-access methods. [`LazyDatabase`] wraps it in a lazily initialized
//! shared handle with a one-shot [`CreatedSignal`] that fires the first time
//! the file is created. The UI layer talks to [`TrackerService`].

pub mod config;
pub mod db;
pub mod keygen;
pub mod migrations;
pub mod models;
pub mod service;
pub mod shared;
pub mod signal;

pub use config::Config;
pub use db::Database;
pub use service::TrackerService;
pub use shared::LazyDatabase;
pub use signal::CreatedSignal;
