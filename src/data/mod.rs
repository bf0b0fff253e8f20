//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations
//! - Account and session store traits

mod database;
mod models;
mod store;

pub use database::Database;
pub use models::*;
pub use store::{AccountStore, SessionStore};

#[cfg(test)]
pub use store::{MockAccountStore, MockSessionStore};
