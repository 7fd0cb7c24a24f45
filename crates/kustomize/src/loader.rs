// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Rooted, sandboxed access to directive and resource files.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::Error;

#[cfg(test)]
#[path = "./loader_test.rs"]
mod loader_test;

/// Reads files relative to a root directory.
///
/// Every path a loader touches, and the root of every loader derived from
/// it, must stay inside the loader's sandbox.
pub trait Loader: std::fmt::Debug {
    /// The directory relative paths are resolved against.
    fn root(&self) -> &Path;

    /// Read the file at `path`, relative to [`Loader::root`].
    fn load(&self, path: &str) -> crate::Result<Vec<u8>>;

    /// Create a loader rooted at the directory `path`, relative to this root.
    fn new_loader(&self, path: &str) -> crate::Result<Box<dyn Loader>>;

    /// Whether `path`, relative to this root, names a directory.
    fn is_dir(&self, path: &str) -> bool;
}

/// Lexically normalize a path, folding `.` and `..` components.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

fn check_sandbox(path: &Path, sandbox: &Path) -> crate::Result<()> {
    if path.starts_with(sandbox) {
        Ok(())
    } else {
        Err(Error::LoaderEscape {
            path: path.to_path_buf(),
            root: sandbox.to_path_buf(),
        })
    }
}

fn not_found(path: &Path) -> Error {
    Error::LoadFailed {
        path: path.to_path_buf(),
        error: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
    }
}

/// Loader over the real filesystem.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
    sandbox: PathBuf,
}

impl FileSystemLoader {
    /// Create a loader at `root`, sandboxed to the filesystem root.
    pub fn new<P: AsRef<Path>>(root: P) -> crate::Result<Self> {
        let root = canonicalize(root.as_ref())?;
        let sandbox = root.ancestors().last().unwrap_or(&root).to_path_buf();
        Ok(Self { root, sandbox })
    }

    /// Create a loader at `root` that refuses to leave `sandbox`.
    pub fn with_sandbox<P: AsRef<Path>, S: AsRef<Path>>(root: P, sandbox: S) -> crate::Result<Self> {
        let root = canonicalize(root.as_ref())?;
        let sandbox = canonicalize(sandbox.as_ref())?;
        check_sandbox(&root, &sandbox)?;
        Ok(Self { root, sandbox })
    }

    pub fn sandbox(&self) -> &Path {
        &self.sandbox
    }

    /// Resolve `path` and verify both its lexical and canonical forms stay
    /// inside the sandbox.
    fn resolve(&self, path: &str) -> crate::Result<PathBuf> {
        let joined = clean_path(&self.root.join(path));
        check_sandbox(&joined, &self.sandbox)?;
        let canonical = canonicalize(&joined)?;
        check_sandbox(&canonical, &self.sandbox)?;
        Ok(canonical)
    }
}

fn canonicalize(path: &Path) -> crate::Result<PathBuf> {
    dunce::canonicalize(path).map_err(|error| Error::LoadFailed {
        path: path.to_path_buf(),
        error,
    })
}

impl Loader for FileSystemLoader {
    fn root(&self) -> &Path {
        &self.root
    }

    fn load(&self, path: &str) -> crate::Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        tracing::trace!(path = %resolved.display(), "loading file");
        std::fs::read(&resolved).map_err(|error| Error::LoadFailed {
            path: resolved,
            error,
        })
    }

    fn new_loader(&self, path: &str) -> crate::Result<Box<dyn Loader>> {
        let root = self.resolve(path)?;
        if !root.is_dir() {
            return Err(not_found(&root));
        }
        Ok(Box::new(Self {
            root,
            sandbox: self.sandbox.clone(),
        }))
    }

    fn is_dir(&self, path: &str) -> bool {
        clean_path(&self.root.join(path)).is_dir()
    }
}

/// Loader over an in-memory file tree.
///
/// Derived loaders share the same files. Directories exist implicitly
/// wherever a file lies below them.
#[derive(Debug, Clone)]
pub struct MemoryLoader {
    files: Arc<BTreeMap<PathBuf, Vec<u8>>>,
    root: PathBuf,
    sandbox: PathBuf,
}

impl MemoryLoader {
    /// Create an empty tree with a loader rooted at `root`, sandboxed to `/`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            files: Arc::default(),
            root: clean_path(root.as_ref()),
            sandbox: PathBuf::from("/"),
        }
    }

    pub fn with_sandbox<S: AsRef<Path>>(mut self, sandbox: S) -> Self {
        self.sandbox = clean_path(sandbox.as_ref());
        self
    }

    /// Add or overwrite a file; `path` is absolute or relative to the root.
    pub fn write_file<P: AsRef<Path>>(&mut self, path: P, content: impl Into<Vec<u8>>) {
        let path = clean_path(&self.root.join(path));
        Arc::make_mut(&mut self.files).insert(path, content.into());
    }

    fn resolve(&self, path: &str) -> crate::Result<PathBuf> {
        let joined = clean_path(&self.root.join(path));
        check_sandbox(&joined, &self.sandbox)?;
        Ok(joined)
    }

    fn dir_exists(&self, dir: &Path) -> bool {
        self.files
            .keys()
            .any(|file| file != dir && file.starts_with(dir))
    }
}

impl Loader for MemoryLoader {
    fn root(&self) -> &Path {
        &self.root
    }

    fn load(&self, path: &str) -> crate::Result<Vec<u8>> {
        let resolved = self.resolve(path)?;
        self.files
            .get(&resolved)
            .cloned()
            .ok_or_else(|| not_found(&resolved))
    }

    fn new_loader(&self, path: &str) -> crate::Result<Box<dyn Loader>> {
        let root = self.resolve(path)?;
        if !self.dir_exists(&root) {
            return Err(not_found(&root));
        }
        Ok(Box::new(Self {
            files: Arc::clone(&self.files),
            root,
            sandbox: self.sandbox.clone(),
        }))
    }

    fn is_dir(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(dir) => self.dir_exists(&dir),
            Err(_) => false,
        }
    }
}
