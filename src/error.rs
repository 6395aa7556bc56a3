use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No exportable conversation found.")]
    NothingToExport,

    #[error("Selection index {index} is out of range (conversation has {count} pairs)")]
    SelectionOutOfRange { index: usize, count: usize },

    #[error("Invalid selection '{0}': expected 'all' or indices like 1,3-5")]
    InvalidSelection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
