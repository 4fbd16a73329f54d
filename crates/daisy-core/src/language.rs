//! Extension-based language detection.
//!
//! Detection is a fixed lookup table keyed on the final dot-delimited suffix
//! of the file name. Matching is exact and case-sensitive (`main.C` is plain
//! text), and the file content is never inspected.

use std::fmt;
use std::path::Path;

/// Language tags understood by the syntax-highlighting widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    C,
    Cpp,
    CSharp,
    Java,
    Go,
    Assembly,
    Html,
    Css,
    JavaScript,
    Rust,
}

impl LanguageId {
    /// Returns the identifier handed to the highlighting widget.
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::C => "c",
            LanguageId::Cpp => "cpp",
            LanguageId::CSharp => "c-sharp",
            LanguageId::Java => "java",
            LanguageId::Go => "go",
            LanguageId::Assembly => "assembly",
            LanguageId::Html => "html",
            LanguageId::Css => "css",
            LanguageId::JavaScript => "javascript",
            LanguageId::Rust => "rust",
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension (without the dot) to language.
pub const LANGUAGE_TABLE: &[(&str, LanguageId)] = &[
    ("c", LanguageId::C),
    ("cpp", LanguageId::Cpp),
    ("cs", LanguageId::CSharp),
    ("java", LanguageId::Java),
    ("go", LanguageId::Go),
    ("asm", LanguageId::Assembly),
    ("s", LanguageId::Assembly),
    ("html", LanguageId::Html),
    ("css", LanguageId::Css),
    ("js", LanguageId::JavaScript),
    ("rs", LanguageId::Rust),
];

/// Returns the text after the last `.` of the file name.
///
/// Only the final path component is considered, so a dot in a directory
/// name never produces an extension. A leading dot counts: `.c` yields `c`.
pub fn extension_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.rfind('.').map(|idx| &name[idx + 1..])
}

/// Detects the language of `path` from its extension.
///
/// Returns `None` (plain text) when there is no extension or it is not in
/// [`LANGUAGE_TABLE`].
pub fn detect_language(path: impl AsRef<Path>) -> Option<LanguageId> {
    let ext = extension_of(path.as_ref())?;
    LANGUAGE_TABLE
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|&(_, lang)| lang)
}
