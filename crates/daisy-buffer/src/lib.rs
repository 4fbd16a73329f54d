//! # Daisy Buffer
//!
//! The in-memory text owned by each open document.
//!
//! The rendering widget is a view over this content: it pushes its full
//! text back with [`TextBuffer::replace_contents`] and reads it with
//! [`TextBuffer::text`]. Persistence is always whole-buffer; there is no
//! incremental diffing and no edit history.

mod buffer;

pub use buffer::TextBuffer;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that can occur during buffer operations
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
