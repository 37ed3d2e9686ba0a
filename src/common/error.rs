use thiserror::Error;

use super::types::PageId;

/// Database error types
#[derive(Error, Debug)]
pub enum BriarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} not found")]
    PageNotFound(PageId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Page overflow: entry size {entry_size} exceeds available space {available}")]
    PageOverflow { entry_size: usize, available: usize },

    #[error("Invalid slot ID: {0}")]
    InvalidSlotId(u16),

    #[error("Key length {len} exceeds maximum {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("Key not found")]
    KeyNotFound,

    #[error("Index file {0} already exists")]
    FileAlreadyExists(String),

    #[error("Index file {0} not found")]
    FileNotFound(String),

    #[error("File name length {0} exceeds catalog limit")]
    FileNameTooLong(usize),

    #[error("Catalog page is full")]
    CatalogFull,

    #[error("Invalid database file")]
    InvalidDatabaseFile,

    #[error("Tree corrupted: {0}")]
    TreeCorrupted(String),
}

pub type Result<T> = std::result::Result<T, BriarError>;
