use actix_web::{http::StatusCode, ResponseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sled(#[from] sled::Error),

    #[error("document encoding error: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not signed in")]
    Unauthorized,

    #[error("only the owner may change this {0}")]
    Forbidden(&'static str),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::Store(err.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Store(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Logs a failed operation and hands the error back to the caller.
pub fn log_error(err: Error, message: &'static str) -> Error {
    match &err {
        Error::Store(_) => log::error!("{}: {}", message, err),
        _ => log::debug!("{}: {:?}", message, err),
    }
    err
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}
