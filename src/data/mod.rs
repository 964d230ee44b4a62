//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Entity models and feed query parameters
//! - Seed-data generation

mod database;
mod models;
pub mod seed;

pub use database::Database;
pub use models::*;

#[cfg(test)]
mod database_test;
