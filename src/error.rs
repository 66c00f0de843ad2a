use thiserror::Error;

use crate::sync::WriteReport;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    Corruption { message: String },
    #[error("Unknown student: {0}")]
    UnknownStudent(u64),
    #[error("Store write failure: {report}")]
    Write { report: WriteReport },
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

// Helper conversions
impl From<rusqlite::Error> for TrackerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}
