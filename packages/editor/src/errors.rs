//! Error types for the editor

use nodegraph_model::{AccessError, DocumentError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("History error: {0}")]
    History(#[from] crate::history::HistoryError),

    #[error("Document is not file-backed")]
    NotFileBacked,

    #[error("No snapshot edit in progress")]
    NoSnapshotEdit,
}
