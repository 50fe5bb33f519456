use thiserror::Error;

/// Main error type for graphrag
#[derive(Error, Debug)]
pub enum GraphRagError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generation backend errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Embedding backend errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Graph store errors
    #[error("Graph error: {0}")]
    Graph(String),

    /// Similarity index errors
    #[error("Index error: {0}")]
    Index(String),

    /// An index write hit an id that is already present
    #[error("Duplicate index id: {0}")]
    DuplicateId(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using GraphRagError
pub type Result<T> = std::result::Result<T, GraphRagError>;
