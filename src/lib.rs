//! VitalTrack: workout and meal tracking behind a small JSON API.

pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod routes;
pub mod services;
pub mod session;
pub mod startup;
pub mod state;

pub use error::AppError;
pub use state::{AppState, Backends};
