//! Batched depth-first directory walk
//!
//! The walker keeps an explicit stack of directory listings instead of
//! recursing. Each call to [`DirectoryWalker::next_batch`] reads only as far
//! as needed to fill one batch, so callers can process (and upload) a batch
//! before the next one is read from disk.

use std::fs;
use std::path::{Path, PathBuf};

/// A regular file found under the walk root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the walk root, `/`-separated on every platform
    pub relative_path: String,
    pub size: u64,
    pub absolute_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("directory walk task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WalkError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Pending children of one directory, in visit order.
#[derive(Debug)]
struct Listing {
    /// Relative path of the directory itself ("" for the root)
    prefix: String,
    children: std::vec::IntoIter<(String, PathBuf)>,
}

#[derive(Debug)]
pub struct DirectoryWalker {
    root: PathBuf,
    batch_size: usize,
    stack: Vec<Listing>,
    started: bool,
}

impl DirectoryWalker {
    /// Create a walker over `root`, yielding at most `batch_size` files per batch.
    ///
    /// Fails with [`WalkError::DirectoryNotFound`] if `root` is not an existing directory.
    pub fn new(root: impl Into<PathBuf>, batch_size: usize) -> Result<Self, WalkError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(WalkError::DirectoryNotFound(root));
        }

        Ok(Self {
            root,
            batch_size: batch_size.max(1),
            stack: Vec::new(),
            started: false,
        })
    }

    /// Read the next batch of files. Returns `Ok(None)` once the tree is exhausted.
    pub fn next_batch(&mut self) -> Result<Option<Vec<FileEntry>>, WalkError> {
        if !self.started {
            self.started = true;
            let listing = read_listing(&self.root, String::new())?;
            self.stack.push(listing);
        }

        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            let Some(top) = self.stack.last_mut() else {
                break;
            };

            let Some((name, path)) = top.children.next() else {
                self.stack.pop();
                continue;
            };

            let relative_path = if top.prefix.is_empty() {
                name
            } else {
                format!("{}/{}", top.prefix, name)
            };

            // symlinks to directories are not followed, symlinks to files are
            let link_meta = fs::symlink_metadata(&path).map_err(|e| WalkError::io(&path, e))?;
            if link_meta.is_dir() {
                let listing = read_listing(&path, relative_path)?;
                self.stack.push(listing);
                continue;
            }

            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if link_meta.file_type().is_symlink() => {
                    tracing::warn!("skipping dangling symlink {}: {}", path.display(), e);
                    continue;
                }
                Err(e) => return Err(WalkError::io(&path, e)),
            };

            if !meta.is_file() {
                tracing::debug!("skipping non-file entry {}", path.display());
                continue;
            }

            batch.push(FileEntry {
                relative_path,
                size: meta.len(),
                absolute_path: path,
            });
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}

impl DirectoryWalker {
    /// [`next_batch`](Self::next_batch) on the blocking thread pool. The
    /// walker moves onto the pool for the read and is handed back with the batch.
    pub async fn next_batch_blocking(mut self) -> Result<(Self, Option<Vec<FileEntry>>), WalkError> {
        tokio::task::spawn_blocking(move || {
            let batch = self.next_batch()?;
            Ok((self, batch))
        })
        .await?
    }
}

impl Iterator for DirectoryWalker {
    type Item = Result<Vec<FileEntry>, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => None,
            Err(e) => {
                // a failed walk does not resume
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}

/// List a directory's children sorted by name.
fn read_listing(dir: &Path, prefix: String) -> Result<Listing, WalkError> {
    let mut children = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| WalkError::io(dir, e))? {
        let entry = entry.map_err(|e| WalkError::io(dir, e))?;
        match entry.file_name().into_string() {
            Ok(name) => children.push((name, entry.path())),
            Err(raw) => {
                tracing::warn!(
                    "skipping {:?} in {}: name is not valid UTF-8",
                    raw,
                    dir.display()
                );
            }
        }
    }

    children.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(Listing {
        prefix,
        children: children.into_iter(),
    })
}
