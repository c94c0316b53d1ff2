//! Lectern - Backend Library
//!
//! Institutional repository backend for a law school: lecture capture
//! pipeline, law-review editorial workflow, and course catalog.

#[macro_use]
mod macros;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
