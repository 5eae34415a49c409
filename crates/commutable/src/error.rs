use thiserror::Error;

use crate::primitives::CellId;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("This notebook format is not supported")]
    FormatNotSupported,

    #[error("nbformat v{major}.{minor} not recognized")]
    VersionNotRecognized { major: i64, minor: i64 },

    #[error("Notebook is not a valid v3 notebook (found nbformat v{major}.{minor})")]
    NotV3 { major: i64, minor: i64 },

    #[error("Notebook is not a valid v4 notebook (found nbformat v{major}.{minor})")]
    NotV4 { major: i64, minor: i64 },

    #[error("Value is not a notebook record: {0}")]
    NotANotebookRecord(String),

    #[error("Output type `{0}` not recognized")]
    UnknownOutputType(String),

    #[error("Output structure not known")]
    OutputStructureUnknown,

    #[error("Cell type unknown: `{0}`")]
    UnknownCellType(String),

    #[error(
        "Only notebook formats 3 and 4 are supported! Notebooks are written as format 4 \
         (got nbformat v{major}.{minor})"
    )]
    UnsupportedWriteVersion { major: i64, minor: i64 },

    #[error("Cell `{0}` not found")]
    CellNotFound(CellId),

    #[error("Cell `{0}` is not a code cell")]
    NotACodeCell(CellId),

    #[error("Duplicate Cell ID found: {0}")]
    DuplicateCellId(CellId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NotebookError>;
