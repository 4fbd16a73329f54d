//! Project file tree for the browser pane.
//!
//! The tree is built once, eagerly, from a root directory and is not kept in
//! sync with later filesystem changes. Entries keep the order the OS lists
//! them in.
//!
//! The walk is bounded three ways: a visited set of canonical directory
//! paths (symlink cycles), an optional depth cap and an optional node cap.
//! Hitting either cap marks the tree as truncated instead of failing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::TreeConfig;
use crate::language::{LanguageId, detect_language, extension_of};
use crate::{CoreError, CoreResult};

/// A tree structure representing files and directories.
#[derive(Debug, Clone)]
pub struct FileTree {
    /// Root node
    pub root: FileTreeNode,

    /// Total nodes, root included
    node_count: usize,

    /// Whether a depth or node cap cut the walk short
    truncated: bool,
}

impl FileTree {
    /// Walks `root` recursively and indexes every visible entry.
    pub fn build(root: impl AsRef<Path>, config: &TreeConfig) -> CoreResult<Self> {
        let root = root.as_ref();
        let meta = std::fs::metadata(root)
            .map_err(|_| CoreError::FileNotFound(root.display().to_string()))?;
        if !meta.is_dir() {
            return Err(CoreError::NotADirectory(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        let mut walker = Walker {
            config,
            visited: HashSet::new(),
            node_count: 1,
            truncated: false,
        };
        walker.visited.insert(root.clone());
        let children = walker.read_children(&root, 0)?;

        let tree = Self {
            root: FileTreeNode {
                name: node_name(&root),
                path: root,
                kind: NodeKind::Directory,
                children,
            },
            node_count: walker.node_count,
            truncated: walker.truncated,
        };

        tracing::debug!(
            "Indexed {} ({} nodes{})",
            tree.root.path.display(),
            tree.node_count,
            if tree.truncated { ", truncated" } else { "" }
        );
        Ok(tree)
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Finds the node with the given full path.
    pub fn find(&self, path: &Path) -> Option<&FileTreeNode> {
        Self::find_node(&self.root, path)
    }

    fn find_node<'a>(node: &'a FileTreeNode, target: &Path) -> Option<&'a FileTreeNode> {
        if node.path == target {
            return Some(node);
        }
        node.children
            .iter()
            .filter(|child| target.starts_with(&child.path))
            .find_map(|child| Self::find_node(child, target))
    }

    /// Iterates the leaf (file) nodes in walk order.
    pub fn files(&self) -> impl Iterator<Item = &FileTreeNode> {
        Preorder {
            stack: vec![&self.root],
        }
        .filter(|node| node.is_file())
    }
}

struct Walker<'a> {
    config: &'a TreeConfig,
    visited: HashSet<PathBuf>,
    node_count: usize,
    truncated: bool,
}

impl Walker<'_> {
    fn read_children(&mut self, dir: &Path, depth: usize) -> CoreResult<Vec<FileTreeNode>> {
        let mut children = Vec::new();

        for entry in std::fs::read_dir(dir)?.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(self.config.hidden_marker) {
                continue;
            }

            if self.config.max_nodes.is_some_and(|max| self.node_count >= max) {
                self.truncated = true;
                break;
            }
            self.node_count += 1;

            let path = entry.path();
            let is_symlink = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
            // Follows symlinks; a dangling link shows up as a file
            let is_dir = std::fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false);

            if !is_dir {
                children.push(FileTreeNode {
                    name,
                    path,
                    kind: NodeKind::File,
                    children: Vec::new(),
                });
                continue;
            }

            let grandchildren = self.descend(&path, depth + 1, is_symlink);
            children.push(FileTreeNode {
                name,
                path,
                kind: NodeKind::Directory,
                children: grandchildren,
            });
        }

        Ok(children)
    }

    /// Children of a subdirectory, or none when a guard stops the walk.
    fn descend(&mut self, dir: &Path, depth: usize, is_symlink: bool) -> Vec<FileTreeNode> {
        if is_symlink && !self.config.follow_symlinks {
            return Vec::new();
        }
        if self.config.max_depth.is_some_and(|max| depth > max) {
            // Only a cut that hides something counts as truncation
            if self.has_visible_entries(dir) {
                self.truncated = true;
            }
            return Vec::new();
        }

        let canonical = match dir.canonicalize() {
            Ok(path) => path,
            Err(err) => {
                tracing::debug!("Skipping {}: {}", dir.display(), err);
                return Vec::new();
            }
        };
        if !self.visited.insert(canonical) {
            tracing::debug!("Cycle at {}, not descending", dir.display());
            return Vec::new();
        }

        match self.read_children(dir, depth) {
            Ok(children) => children,
            Err(err) => {
                tracing::debug!("Cannot list {}: {}", dir.display(), err);
                Vec::new()
            }
        }
    }

    fn has_visible_entries(&self, dir: &Path) -> bool {
        std::fs::read_dir(dir).is_ok_and(|entries| {
            entries.flatten().any(|entry| {
                !entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(self.config.hidden_marker)
            })
        })
    }
}

struct Preorder<'a> {
    stack: Vec<&'a FileTreeNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a FileTreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A node in the file tree.
#[derive(Debug, Clone)]
pub struct FileTreeNode {
    /// File/directory name
    pub name: String,

    /// Full path
    pub path: PathBuf,

    /// Node type
    pub kind: NodeKind,

    /// Child nodes in OS listing order (directories only)
    pub children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    /// Returns the file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        extension_of(&self.path)
    }

    /// Returns the language a document opened from this node would get.
    pub fn language(&self) -> Option<LanguageId> {
        match self.kind {
            NodeKind::File => detect_language(&self.path),
            NodeKind::Directory => None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Type of file tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(nodes: &[FileTreeNode]) -> Vec<&str> {
        let mut names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    #[test]
    fn test_hidden_entries_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::write(dir.path().join(".env"), "X=1").unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let tree = FileTree::build(dir.path(), &TreeConfig::default()).unwrap();

        assert_eq!(names(&tree.root.children), vec!["main.rs"]);
        let leaf = &tree.root.children[0];
        assert!(leaf.is_file());
        assert_eq!(leaf.language(), Some(LanguageId::Rust));
        assert_eq!(tree.node_count(), 2);
        assert!(!tree.truncated());
    }

    #[test]
    fn test_nested_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/bin")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/bin/tool.c"), "").unwrap();
        std::fs::write(dir.path().join("README"), "").unwrap();

        let tree = FileTree::build(dir.path(), &TreeConfig::default()).unwrap();

        assert_eq!(names(&tree.root.children), vec!["README", "src"]);
        let mut files: Vec<&str> = tree.files().map(|n| n.name.as_str()).collect();
        files.sort_unstable();
        assert_eq!(files, vec!["README", "lib.rs", "tool.c"]);

        let tool = tree.root.path.join("src/bin/tool.c");
        let node = tree.find(&tool).unwrap();
        assert_eq!(node.extension(), Some("c"));
        assert_eq!(tree.node_count(), 6);
    }

    #[test]
    fn test_custom_hidden_marker() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("_draft.rs"), "").unwrap();
        std::fs::write(dir.path().join(".keep"), "").unwrap();

        let config = TreeConfig {
            hidden_marker: '_',
            ..TreeConfig::default()
        };
        let tree = FileTree::build(dir.path(), &config).unwrap();
        assert_eq!(names(&tree.root.children), vec![".keep"]);
    }

    #[test]
    fn test_depth_cap() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        std::fs::write(dir.path().join("a/b/c/deep.rs"), "").unwrap();

        let config = TreeConfig {
            max_depth: Some(1),
            ..TreeConfig::default()
        };
        let tree = FileTree::build(dir.path(), &config).unwrap();

        let a = &tree.root.children[0];
        let b = &a.children[0];
        assert_eq!(b.name, "b");
        assert!(b.is_directory());
        assert!(b.children.is_empty());
        assert!(tree.truncated());
    }

    #[test]
    fn test_depth_cap_over_empty_directories_is_not_truncation() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        std::fs::create_dir(dir.path().join("dotted")).unwrap();
        std::fs::write(dir.path().join("dotted/.x"), "").unwrap();

        let config = TreeConfig {
            max_depth: Some(0),
            ..TreeConfig::default()
        };
        let tree = FileTree::build(dir.path(), &config).unwrap();

        assert_eq!(tree.root.children.len(), 2);
        assert!(tree.root.children.iter().all(|n| n.children.is_empty()));
        assert!(!tree.truncated());
    }

    #[test]
    fn test_node_cap() {
        let dir = tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("f{i}.c")), "").unwrap();
        }

        let config = TreeConfig {
            max_nodes: Some(4),
            ..TreeConfig::default()
        };
        let tree = FileTree::build(dir.path(), &config).unwrap();
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.root.children.len(), 3);
        assert!(tree.truncated());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle_terminates() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("src/loop")).unwrap();

        let config = TreeConfig {
            follow_symlinks: true,
            ..TreeConfig::default()
        };
        let tree = FileTree::build(dir.path(), &config).unwrap();

        let src = &tree.root.children[0];
        let link = src.children.iter().find(|n| n.name == "loop").unwrap();
        assert!(link.is_directory());
        assert!(link.children.is_empty());
        assert_eq!(tree.files().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dirs_not_followed_by_default() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("other.rs"), "").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("linked")).unwrap();

        let tree = FileTree::build(dir.path(), &TreeConfig::default()).unwrap();
        let linked = &tree.root.children[0];
        assert!(linked.is_directory());
        assert!(linked.children.is_empty());
    }

    #[test]
    fn test_root_must_be_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("main.c");
        std::fs::write(&file, "").unwrap();

        assert!(matches!(
            FileTree::build(&file, &TreeConfig::default()),
            Err(CoreError::NotADirectory(_))
        ));
        assert!(matches!(
            FileTree::build(dir.path().join("missing"), &TreeConfig::default()),
            Err(CoreError::FileNotFound(_))
        ));
    }
}
