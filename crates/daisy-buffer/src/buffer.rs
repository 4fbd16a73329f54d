//! Core text buffer implementation using rope data structure.
//!
//! ## Why Rope?
//!
//! Source files can be large and the widget pushes its whole text on every
//! sync. A rope compares against the incoming text without flattening
//! itself and streams out chunk by chunk when the file is written.

use ropey::Rope;
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::BufferResult;

/// A text buffer backed by a rope data structure.
///
/// # Thread Safety
///
/// `TextBuffer` is `Send` but not `Sync`. It lives on the main loop together
/// with the rest of the session state.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    /// The rope holding our text content
    rope: Rope,

    /// Whether the buffer has changed since it was loaded or last written
    modified: bool,
}

impl TextBuffer {
    /// Creates a new empty buffer.
    ///
    /// # Example
    /// ```
    /// use daisy_buffer::TextBuffer;
    ///
    /// let buffer = TextBuffer::new();
    /// assert!(buffer.text().is_empty());
    /// ```
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            modified: false,
        }
    }

    /// Overwrites `path` with the full buffer content.
    ///
    /// The content goes to a sibling temporary file first and is then
    /// renamed over the target, so a failed write never leaves a truncated
    /// file behind.
    pub fn write_to(&mut self, path: impl AsRef<Path>) -> BufferResult<()> {
        let path = path.as_ref();
        let temp_path = temp_sibling(path)?;

        let result = (|| {
            let mut file = std::fs::File::create(&temp_path)?;
            for chunk in self.rope.chunks() {
                file.write_all(chunk.as_bytes())?;
            }
            file.sync_all()?;
            std::fs::rename(&temp_path, path)
        })();

        if let Err(err) = result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(err.into());
        }

        self.modified = false;
        Ok(())
    }

    // ==================== Text Access ====================

    /// Returns the entire text content as a `Cow<str>`.
    ///
    /// Borrowed when the rope is a single chunk, allocated otherwise.
    #[inline]
    pub fn text(&self) -> Cow<'_, str> {
        self.rope.slice(..).into()
    }

    // ==================== Measurements ====================

    /// Returns the number of bytes in the buffer.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    // ==================== Mutations ====================

    /// Replaces the whole content, as pushed from the rendering widget.
    ///
    /// Identical content leaves the modified flag untouched.
    pub fn replace_contents(&mut self, text: &str) {
        if self.rope == text {
            return;
        }
        self.rope = Rope::from_str(text);
        self.modified = true;
    }

    // ==================== State Queries ====================

    /// Returns true if the buffer has unsaved changes.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl From<&str> for TextBuffer {
    fn from(s: &str) -> Self {
        Self {
            rope: Rope::from_str(s),
            modified: false,
        }
    }
}

impl From<String> for TextBuffer {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

/// `dir/.name.daisy-tmp` next to `dir/name`.
fn temp_sibling(path: &Path) -> std::io::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(name);
    temp_name.push(".daisy-tmp");
    Ok(path.with_file_name(temp_name))
}
