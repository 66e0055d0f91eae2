use crate::{
    errors::{FileOperation, IoError},
    utils::tree_path,
};
use miette::Diagnostic;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Diagnostic)]
pub enum TreeError {
    #[error("I/O error within tree domain")]
    #[diagnostic(code(sprig::tree::io))]
    Io(#[from] IoError),

    #[error("two trees write the same file: '{path}'")]
    #[diagnostic(
        code(sprig::tree::collision),
        help("Rename one of the files, or move it to a different destDir")
    )]
    Collision { path: PathBuf },

    #[error("source directory not found: '{path}'")]
    #[diagnostic(
        code(sprig::tree::missing_dir),
        help("Create the directory or disable the option that points at it")
    )]
    MissingDir { path: PathBuf },

    #[error("source file not found: '{path}'")]
    #[diagnostic(code(sprig::tree::missing_file))]
    MissingFile { path: PathBuf },

    #[error("unable to strip prefix from directory")]
    #[diagnostic(code(sprig::tree::strip_prefix))]
    StripPrefix {
        path: PathBuf,
        dir: PathBuf,
        source: std::path::StripPrefixError,
    },
}

/// How [`Tree::union`] resolves a path present on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// Collisions are an error.
    Strict,
    /// The tree being merged into keeps its file.
    Existing,
    /// The tree being merged in replaces the file.
    Incoming,
}

/// An in-memory directory snapshot: relative file paths mapped to their contents.
///
/// Directories are implied by the paths of the files they hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    files: BTreeMap<PathBuf, Vec<u8>>,
}
impl Tree {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    /// Adds or replaces a file. The path is normalized to be tree-relative.
    pub fn insert<P: AsRef<Path>>(&mut self, path: P, content: impl Into<Vec<u8>>) {
        self.files.insert(tree_path(path), content.into());
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&[u8]> {
        self.files.get(&tree_path(path)).map(Vec::as_slice)
    }

    /// Contents of a file as text, if present and valid UTF-8.
    pub fn get_str<P: AsRef<Path>>(&self, path: P) -> Option<&str> {
        self.get(path).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.contains_key(&tree_path(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[u8])> {
        self.files
            .iter()
            .map(|(path, content)| (path.as_path(), content.as_slice()))
    }

    /// Moves every file under `dest_dir`.
    pub fn relocate(self, dest_dir: &str) -> Tree {
        let prefix = tree_path(dest_dir);
        if prefix.as_os_str().is_empty() {
            return self;
        }

        Tree {
            files: self
                .files
                .into_iter()
                .map(|(path, content)| (prefix.join(path), content))
                .collect(),
        }
    }

    /// Combines two trees. `other` is the tree being merged in.
    pub fn union(mut self, other: Tree, precedence: Precedence) -> Result<Tree, TreeError> {
        for (path, content) in other.files {
            match (self.files.contains_key(&path), precedence) {
                (false, _) | (true, Precedence::Incoming) => {
                    self.files.insert(path, content);
                }
                (true, Precedence::Existing) => {
                    log::debug!("keeping existing file over incoming: {}", path.display());
                }
                (true, Precedence::Strict) => return Err(TreeError::Collision { path }),
            }
        }

        Ok(self)
    }

    /// Reads every file below `src_dir`, optionally only those with the given extension,
    /// into a tree rooted at `dest_dir`.
    pub fn funnel(
        src_dir: &Path,
        extension: Option<&str>,
        dest_dir: &str,
    ) -> Result<Tree, TreeError> {
        if !src_dir.is_dir() {
            return Err(TreeError::MissingDir {
                path: src_dir.to_path_buf(),
            });
        }

        let mut tree = Tree::new();

        for entry in WalkDir::new(src_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(error) => {
                    let path = error.path().unwrap_or_else(|| Path::new("")).to_path_buf();

                    Err(IoError::new(FileOperation::Walk, path, error.into()))?
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let full_path = entry.path();

            if let Some(extension) = extension {
                if full_path.extension().map(|ext| ext != extension).unwrap_or(true) {
                    continue;
                }
            }

            let relative = full_path
                .strip_prefix(src_dir)
                .map_err(|error| TreeError::StripPrefix {
                    path: full_path.to_path_buf(),
                    dir: src_dir.to_path_buf(),
                    source: error,
                })?;

            let content = fs::read(full_path)
                .map_err(|error| IoError::new(FileOperation::Read, full_path.to_path_buf(), error))?;

            tree.insert(relative, content);
        }

        Ok(tree.relocate(dest_dir))
    }

    /// Like [`Tree::funnel`], but a missing `src_dir` yields an empty tree.
    pub fn funnel_optional(
        src_dir: &Path,
        extension: Option<&str>,
        dest_dir: &str,
    ) -> Result<Tree, TreeError> {
        if src_dir.is_dir() {
            Tree::funnel(src_dir, extension, dest_dir)
        } else {
            log::debug!("skipping missing directory: {}", src_dir.display());
            Ok(Tree::new())
        }
    }

    /// Copies the named files from `src_dir` into a tree rooted at `dest_dir`.
    pub fn pick(src_dir: &Path, files: &[&str], dest_dir: &str) -> Result<Tree, TreeError> {
        let mut tree = Tree::new();

        for file in files {
            let full_path = src_dir.join(file);

            if !full_path.is_file() {
                return Err(TreeError::MissingFile { path: full_path });
            }

            let content = fs::read(&full_path)
                .map_err(|error| IoError::new(FileOperation::Read, full_path.clone(), error))?;

            tree.insert(file, content);
        }

        Ok(tree.relocate(dest_dir))
    }

    /// Writes the tree below `root` without any rollback bookkeeping. Used to hand a tree
    /// to an external tool.
    pub fn materialize(&self, root: &Path) -> Result<(), TreeError> {
        for (path, content) in &self.files {
            let target = root.join(path);

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .map_err(|error| IoError::new(FileOperation::Mkdir, parent.to_path_buf(), error))?;
            }

            fs::write(&target, content)
                .map_err(|error| IoError::new(FileOperation::Write, target.clone(), error))?;
        }

        Ok(())
    }
}
