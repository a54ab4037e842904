use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone, Error, Debug)]
pub enum UserError {
    #[error("Database not connected")]
    NotConnected,

    #[error("User not found")]
    NotFound,

    #[error("User already exists")]
    AlreadyExists,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

impl From<mongodb::error::Error> for UserError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => {
                UserError::AlreadyExists
            }
            _ => UserError::Storage(err.to_string()),
        }
    }
}

impl From<bson::ser::Error> for UserError {
    fn from(err: bson::ser::Error) -> Self {
        UserError::InvalidData(err.to_string())
    }
}

impl From<bson::de::Error> for UserError {
    fn from(err: bson::de::Error) -> Self {
        UserError::InvalidData(err.to_string())
    }
}
