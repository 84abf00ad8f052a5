//! Sandboxed async file access used by the workspace coordinator (§6.2).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::Mutex;

use crate::error::WorkspaceIoError;

/// Minimal metadata the coordinator needs: whether a path exists as a file
/// or directory and when it was last modified (for parse-cache keys, §6.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// One entry from a recursive directory walk (§6.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub full_path: Utf8PathBuf,
    pub basename: String,
}

/// The file operations the coordinator consumes. Paths are relative to
/// whatever root the implementation was constructed with.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn stat(&self, path: &Utf8Path) -> Result<Option<FileStat>, WorkspaceIoError>;

    async fn exists(&self, path: &Utf8Path) -> Result<bool, WorkspaceIoError> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn read_text_file(&self, path: &Utf8Path) -> Result<String, WorkspaceIoError>;

    async fn write_text_file(&self, path: &Utf8Path, contents: &str) -> Result<(), WorkspaceIoError>;

    async fn mkdirp(&self, path: &Utf8Path) -> Result<(), WorkspaceIoError>;

    async fn rm(&self, path: &Utf8Path) -> Result<(), WorkspaceIoError>;

    /// Recursive walk, skipping entries whose basename starts with `.` (§6.2).
    async fn walk(&self, root: &Utf8Path) -> Result<Vec<DirEntry>, WorkspaceIoError>;
}

fn skip_dotted(basename: &str) -> bool {
    basename.starts_with('.')
}

/// Production implementation: a `cap_std` sandboxed directory accessed
/// through `spawn_blocking`, since `cap-std`'s directory handle is
/// synchronous by design (capability-based sandboxing predates async I/O in
/// the ecosystem) and the rest of the workspace is `tokio`-async.
pub struct TokioFileSystem {
    dir: Arc<cap_std::fs_utf8::Dir>,
}

impl TokioFileSystem {
    /// Sandbox all operations under `root`, the way the teacher sandboxes a
    /// single configuration file's ambient read.
    pub fn open_ambient(root: &Utf8Path) -> Result<Self, WorkspaceIoError> {
        let dir = cap_std::fs_utf8::Dir::open_ambient_dir(root, cap_std::ambient_authority())
            .map_err(|source| WorkspaceIoError::Io {
                path: root.to_path_buf(),
                source,
            })?;
        Ok(Self { dir: Arc::new(dir) })
    }

    fn walk_dir(dir: &cap_std::fs_utf8::Dir, prefix: &Utf8Path, out: &mut Vec<DirEntry>) -> std::io::Result<()> {
        for entry in dir.entries()? {
            let entry = entry?;
            let basename = entry.file_name()?;
            if skip_dotted(&basename) {
                continue;
            }
            let full_path = prefix.join(&basename);
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                let sub = dir.open_dir(&basename)?;
                Self::walk_dir(&sub, &full_path, out)?;
            } else {
                out.push(DirEntry { full_path, basename });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn stat(&self, path: &Utf8Path) -> Result<Option<FileStat>, WorkspaceIoError> {
        let dir = Arc::clone(&self.dir);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || match dir.metadata(&path) {
            Ok(meta) => Ok(Some(FileStat {
                is_dir: meta.is_dir(),
                modified: meta.modified().ok().map(SystemTime::from),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(WorkspaceIoError::Io { path, source }),
        })
        .await
        .expect("spawn_blocking panicked")
    }

    async fn read_text_file(&self, path: &Utf8Path) -> Result<String, WorkspaceIoError> {
        let dir = Arc::clone(&self.dir);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            dir.read_to_string(&path)
                .map_err(|source| WorkspaceIoError::Io { path, source })
        })
        .await
        .expect("spawn_blocking panicked")
    }

    async fn write_text_file(&self, path: &Utf8Path, contents: &str) -> Result<(), WorkspaceIoError> {
        let dir = Arc::clone(&self.dir);
        let path = path.to_path_buf();
        let contents = contents.to_owned();
        tokio::task::spawn_blocking(move || {
            dir.write(&path, contents.as_bytes())
                .map_err(|source| WorkspaceIoError::Io { path, source })
        })
        .await
        .expect("spawn_blocking panicked")
    }

    async fn mkdirp(&self, path: &Utf8Path) -> Result<(), WorkspaceIoError> {
        let dir = Arc::clone(&self.dir);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            dir.create_dir_all(&path)
                .map_err(|source| WorkspaceIoError::Io { path, source })
        })
        .await
        .expect("spawn_blocking panicked")
    }

    async fn rm(&self, path: &Utf8Path) -> Result<(), WorkspaceIoError> {
        let dir = Arc::clone(&self.dir);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || match dir.remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceIoError::Io { path, source }),
        })
        .await
        .expect("spawn_blocking panicked")
    }

    async fn walk(&self, root: &Utf8Path) -> Result<Vec<DirEntry>, WorkspaceIoError> {
        let dir = Arc::clone(&self.dir);
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let start = if root.as_str().is_empty() {
                (*dir).try_clone().map_err(|source| WorkspaceIoError::Io {
                    path: root.clone(),
                    source,
                })?
            } else {
                dir.open_dir(&root).map_err(|source| WorkspaceIoError::Io {
                    path: root.clone(),
                    source,
                })?
            };
            let mut out = Vec::new();
            Self::walk_dir(&start, &root, &mut out)
                .map_err(|source| WorkspaceIoError::Io { path: root.clone(), source })?;
            Ok(out)
        })
        .await
        .expect("spawn_blocking panicked")
    }
}

/// In-memory test double: no sandboxing, no disk access.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<Utf8PathBuf, String>>,
}

impl MemoryFileSystem {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without going through the async API, for test setup.
    pub async fn seed(&self, path: impl Into<Utf8PathBuf>, contents: impl Into<String>) {
        self.files.lock().await.insert(path.into(), contents.into());
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn stat(&self, path: &Utf8Path) -> Result<Option<FileStat>, WorkspaceIoError> {
        let files = self.files.lock().await;
        if files.contains_key(path) {
            return Ok(Some(FileStat { is_dir: false, modified: None }));
        }
        let prefix = format!("{path}/");
        if files.keys().any(|p| p.as_str().starts_with(&prefix)) {
            return Ok(Some(FileStat { is_dir: true, modified: None }));
        }
        Ok(None)
    }

    async fn read_text_file(&self, path: &Utf8Path) -> Result<String, WorkspaceIoError> {
        self.files
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| WorkspaceIoError::Other(format!("no such file: {path}")))
    }

    async fn write_text_file(&self, path: &Utf8Path, contents: &str) -> Result<(), WorkspaceIoError> {
        self.files.lock().await.insert(path.to_path_buf(), contents.to_owned());
        Ok(())
    }

    async fn mkdirp(&self, _path: &Utf8Path) -> Result<(), WorkspaceIoError> {
        Ok(())
    }

    async fn rm(&self, path: &Utf8Path) -> Result<(), WorkspaceIoError> {
        self.files.lock().await.remove(path);
        Ok(())
    }

    async fn walk(&self, root: &Utf8Path) -> Result<Vec<DirEntry>, WorkspaceIoError> {
        let files = self.files.lock().await;
        let prefix = if root.as_str().is_empty() {
            String::new()
        } else {
            format!("{root}/")
        };
        let mut out: Vec<DirEntry> = files
            .keys()
            .filter(|p| p.as_str().starts_with(&prefix))
            .filter(|p| {
                p.as_str()[prefix.len()..]
                    .split('/')
                    .all(|segment| !skip_dotted(segment))
            })
            .map(|p| DirEntry {
                full_path: p.clone(),
                basename: p.file_name().unwrap_or_default().to_string(),
            })
            .collect();
        out.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        Ok(out)
    }
}
