//! Account storage and authentication for the medassist web app: account
//! creation, password hashing, email OTP verification, profiles,
//! consultation history and medication reminders, kept in MongoDB.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod state;
pub mod telemetry;
pub mod users;

pub use config::{AppConfig, DatabaseConfig};
pub use db::Database;
pub use errors::UserError;
pub use state::AppState;
pub use users::{NewUser, Profile, UserDocument, UserStats, Users};
