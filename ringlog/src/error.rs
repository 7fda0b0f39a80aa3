//! Error types for the ringlog shared ring-buffer log.
//!
//! Only storage-layer failures are errors. A foreign or corrupt store is
//! healed on open, over-long messages are truncated, and a follower that was
//! lapped by writers gets a fresh cursor; none of those reach the caller as
//! an `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for all ringlog operations.
#[derive(Error, Debug)]
pub enum RingLogError {
    /// Error opening, creating or mapping a store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Error writing exported text to its destination.
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// Error loading or saving a follower cursor.
    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),
}

/// Errors that can occur when opening or creating a store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing file could not be opened, created or resized.
    #[error("failed to access log file '{}': {source}", path.display())]
    Io {
        /// The path that could not be accessed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Memory mapping failed.
    #[error("memory mapping failed for log file '{}': {source}", path.display())]
    MemoryMap {
        /// The file path that failed to map.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An existing file is not a store of this schema.
    #[error("'{}' is not a ringlog file: {reason}", path.display())]
    NotALog {
        /// The file path.
        path: PathBuf,
        /// What did not match.
        reason: String,
    },
}

/// Errors that can occur while exporting rendered lines.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The destination file could not be created or truncated.
    #[error("failed to create export destination '{}': {source}", path.display())]
    Create {
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing or flushing rendered lines failed part way through.
    #[error("failed to write exported lines: {source}")]
    Write {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while persisting a follower cursor.
#[derive(Error, Debug)]
pub enum CursorError {
    /// Failed to read the cursor file.
    #[error("failed to load follow cursor from '{}': {source}", path.display())]
    Load {
        /// The cursor file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the cursor file as JSON.
    #[error("failed to parse follow cursor from '{}': {source}", path.display())]
    Parse {
        /// The cursor file path.
        path: PathBuf,
        /// The underlying JSON parsing error.
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the cursor file.
    #[error("failed to save follow cursor to '{}': {source}", path.display())]
    Save {
        /// The cursor file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the cursor to JSON.
    #[error("failed to serialize follow cursor: {source}")]
    Serialize {
        /// The underlying JSON serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Type alias for `Result<T, RingLogError>`.
pub type Result<T> = std::result::Result<T, RingLogError>;
