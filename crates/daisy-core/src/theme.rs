//! Light/dark presentation.
//!
//! The theme is global: one flag decides the color scheme of every open
//! document, and there is no per-document override.

use std::fmt;

use crate::document::Document;

/// The two syntax-highlighting schemes the widget knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorScheme {
    /// Light scheme
    #[default]
    Classic,
    /// Dark scheme
    Dark,
}

impl ColorScheme {
    /// Returns the scheme matching the dark-mode flag.
    pub fn for_dark_mode(dark: bool) -> Self {
        if dark { ColorScheme::Dark } else { ColorScheme::Classic }
    }

    /// Returns the scheme identifier handed to the widget.
    pub fn id(&self) -> &'static str {
        match self {
            ColorScheme::Classic => "classic",
            ColorScheme::Dark => "dark",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, ColorScheme::Dark)
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Process-wide dark-mode flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThemeState {
    dark_mode: bool,
}

impl ThemeState {
    pub fn new(dark_mode: bool) -> Self {
        Self { dark_mode }
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Returns the scheme every document must currently show.
    pub fn scheme(&self) -> ColorScheme {
        ColorScheme::for_dark_mode(self.dark_mode)
    }

    /// Sets the flag and re-applies it to `documents` in order.
    ///
    /// Returns true if the flag actually changed.
    pub fn set_dark_mode<'a>(
        &mut self,
        enabled: bool,
        documents: impl IntoIterator<Item = &'a mut Document>,
    ) -> bool {
        let changed = self.dark_mode != enabled;
        self.dark_mode = enabled;
        for doc in documents {
            apply_theme(doc, enabled);
        }
        changed
    }
}

/// Sets a document's scheme from the dark-mode flag.
pub fn apply_theme(document: &mut Document, dark_mode: bool) {
    document.set_scheme(ColorScheme::for_dark_mode(dark_mode));
}
