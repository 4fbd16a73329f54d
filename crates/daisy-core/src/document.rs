//! Documents and the session that orders them.
//!
//! ## Handles
//!
//! `DocumentId` is a newtype around `Uuid`. Tabs are addressed by identity,
//! never by index, so closing one tab cannot silently retarget a handle the
//! caller is holding to a different document.

use daisy_buffer::TextBuffer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::language::{LanguageId, detect_language};
use crate::theme::ColorScheme;
use crate::{CoreError, CoreResult};

/// Title shown on the tab of a document that was never saved.
pub const UNTITLED: &str = "Untitled";

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new unique document ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open editable unit of text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Unique identifier
    id: DocumentId,

    /// Short name shown on the tab
    title: String,

    /// File path (None for never-saved documents)
    path: Option<PathBuf>,

    /// Language for syntax highlighting (None = plain text)
    language: Option<LanguageId>,

    /// The text content
    buffer: TextBuffer,

    /// Color scheme currently applied
    scheme: ColorScheme,
}

impl Document {
    /// Creates a document from already-loaded content.
    pub fn new(
        title: impl Into<String>,
        content: &str,
        path: Option<PathBuf>,
        language: Option<LanguageId>,
        scheme: ColorScheme,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            path,
            language,
            buffer: TextBuffer::from(content),
            scheme,
        }
    }

    /// Returns the tab title for a path: its base name, or `Untitled`.
    pub fn title_for(path: Option<&Path>) -> String {
        path.and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| UNTITLED.to_string())
    }

    // ==================== Getters ====================

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn language(&self) -> Option<LanguageId> {
        self.language
    }

    pub fn scheme(&self) -> ColorScheme {
        self.scheme
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut TextBuffer {
        &mut self.buffer
    }

    /// Returns all text.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        self.buffer.text()
    }

    /// Returns true if the buffer changed since it was opened or saved.
    pub fn is_modified(&self) -> bool {
        self.buffer.is_modified()
    }

    // ==================== Mutations ====================

    pub(crate) fn set_scheme(&mut self, scheme: ColorScheme) {
        self.scheme = scheme;
    }

    /// Binds the document to a new path, refreshing title and language.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.title = Self::title_for(Some(&path));
        self.language = detect_language(&path);
        self.path = Some(path);
    }

    /// Overwrites the backing file with the whole buffer.
    pub fn save(&mut self) -> CoreResult<&Path> {
        let path = self.path.as_deref().ok_or(CoreError::Untitled(self.id))?;
        self.buffer.write_to(path)?;
        Ok(path)
    }

    /// Writes the whole buffer to `path`, then binds the document to it.
    ///
    /// A failed write leaves path, title and language untouched.
    pub fn save_to(&mut self, path: impl Into<PathBuf>) -> CoreResult<()> {
        let path = path.into();
        self.buffer.write_to(&path)?;
        self.set_path(path);
        Ok(())
    }
}

/// The ordered set of open documents plus the active one.
///
/// Insertion order is tab order.
#[derive(Debug, Default)]
pub struct Session {
    /// Open documents in tab order
    documents: Vec<Document>,

    /// Currently active document
    active: Option<DocumentId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a document and makes it active.
    pub fn open(&mut self, doc: Document) -> DocumentId {
        let id = doc.id();
        self.documents.push(doc);
        self.active = Some(id);
        id
    }

    /// Removes a document and re-clamps the active selection.
    ///
    /// When the active tab is closed the tab that slides into its index
    /// becomes active, or the new last tab if it was the last one. Closing
    /// any other tab leaves the active document unchanged. Unsaved content
    /// is discarded.
    pub fn close(&mut self, id: DocumentId) -> CoreResult<Document> {
        let index = self
            .index_of(id)
            .ok_or(CoreError::DocumentNotFound(id))?;
        let removed = self.documents.remove(index);

        if self.active == Some(id) {
            let next = index.min(self.documents.len().saturating_sub(1));
            self.active = self.documents.get(next).map(Document::id);
        }

        Ok(removed)
    }

    /// Returns the active document, or `None` for an empty session.
    pub fn active(&self) -> Option<&Document> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut Document> {
        let id = self.active?;
        self.get_mut(id)
    }

    pub fn active_id(&self) -> Option<DocumentId> {
        self.active
    }

    /// Returns the tab index of the active document.
    pub fn active_index(&self) -> Option<usize> {
        self.active.and_then(|id| self.index_of(id))
    }

    /// Makes `id` the active document.
    pub fn set_active(&mut self, id: DocumentId) -> CoreResult<()> {
        if self.index_of(id).is_none() {
            return Err(CoreError::DocumentNotFound(id));
        }
        self.active = Some(id);
        Ok(())
    }

    /// Makes the tab at `index` active.
    pub fn set_active_index(&mut self, index: usize) -> CoreResult<DocumentId> {
        let id = self
            .documents
            .get(index)
            .map(Document::id)
            .ok_or_else(|| {
                CoreError::InvalidOperation(format!("no tab at index {index}"))
            })?;
        self.active = Some(id);
        Ok(id)
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.iter().find(|d| d.id() == id)
    }

    pub fn get_mut(&mut self, id: DocumentId) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id() == id)
    }

    pub fn index_of(&self, id: DocumentId) -> Option<usize> {
        self.documents.iter().position(|d| d.id() == id)
    }

    /// Finds an open document by its file path.
    pub fn find_by_path(&self, path: &Path) -> Option<DocumentId> {
        self.documents
            .iter()
            .find(|d| d.path() == Some(path))
            .map(Document::id)
    }

    /// Iterates documents in tab order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Document> {
        self.documents.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns true if any document has unsaved changes.
    pub fn has_unsaved_changes(&self) -> bool {
        self.documents.iter().any(Document::is_modified)
    }
}
