pub mod artwork;
pub mod companions;
pub mod dedup;
pub mod filter;
pub mod hasher;
pub mod notify;
pub mod parser;
pub mod pipeline;
pub mod placement;
pub mod status;
pub mod walk;

pub use pipeline::{BatchSummary, FileOutcome, Organizer, ProcessingOutcome};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("no metadata found for {0}")]
    MetadataNotFound(String),
    #[error("copy failed: {0}")]
    Copy(placement::PlaceError),
    #[error("cannot organize {0}")]
    Parse(String),
}

impl From<placement::PlaceError> for OrganizeError {
    fn from(e: placement::PlaceError) -> Self {
        match e {
            placement::PlaceError::Cancelled => Self::Cancelled,
            other => Self::Copy(other),
        }
    }
}
