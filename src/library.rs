//! Managed media storage and collision-free destination paths

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Attempts at committing a staged file before giving up on a name race
const MAX_COMMIT_ATTEMPTS: usize = 32;

/// Stem used when the source filename has none
const FALLBACK_STEM: &str = "media";

/// Managed storage locations inside the library root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaDirectory {
    /// Media waiting to be uploaded
    #[default]
    Uploads,

    /// Media that can be regenerated
    Cache,

    /// Short-lived working files
    Temporary,
}

impl MediaDirectory {
    pub const ALL: [MediaDirectory; 3] = [
        MediaDirectory::Uploads,
        MediaDirectory::Cache,
        MediaDirectory::Temporary,
    ];

    /// Sub-directory name under the library root
    pub fn dir_name(&self) -> &'static str {
        match self {
            MediaDirectory::Uploads => "uploads",
            MediaDirectory::Cache => "cache",
            MediaDirectory::Temporary => "temporary",
        }
    }
}

impl fmt::Display for MediaDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for MediaDirectory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaDirectory::ALL
            .into_iter()
            .find(|dir| dir.dir_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown media directory: {}", s))
    }
}

/// Local media library rooted at a single directory
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a managed directory (not created)
    pub fn directory_path(&self, directory: MediaDirectory) -> PathBuf {
        self.root.join(directory.dir_name())
    }

    /// Create a managed directory if needed and return its path
    pub async fn ensure_directory(&self, directory: MediaDirectory) -> io::Result<PathBuf> {
        let path = self.directory_path(directory);
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }

    /// First unused path for `filename` with `extension` in `directory`.
    ///
    /// The stem gets `-1`, `-2`, ... appended until the name is free. The
    /// result is only a candidate; `commit` is what claims it.
    pub async fn allocate_path(
        &self,
        filename: &str,
        extension: &str,
        directory: MediaDirectory,
    ) -> io::Result<PathBuf> {
        let dir = self.ensure_directory(directory).await?;
        let stem = sanitized_stem(filename);
        let extension = extension.trim_start_matches('.');

        let mut candidate = dir.join(file_name(&stem, None, extension));
        let mut suffix = 0usize;
        while tokio::fs::try_exists(&candidate).await? {
            suffix += 1;
            candidate = dir.join(file_name(&stem, Some(suffix), extension));
        }

        Ok(candidate)
    }

    /// Create an empty staging file inside `directory`.
    ///
    /// The file is deleted when dropped unless it is committed.
    pub async fn stage(&self, directory: MediaDirectory, extension: &str) -> io::Result<NamedTempFile> {
        let dir = self.ensure_directory(directory).await?;
        let suffix = format!(".{}", extension.trim_start_matches('.'));
        run_blocking(move || {
            tempfile::Builder::new()
                .prefix(".export-")
                .suffix(&suffix)
                .tempfile_in(dir)
        })
        .await?
    }

    /// Move a staged file to a fresh name without replacing anything.
    pub async fn commit(
        &self,
        mut staged: NamedTempFile,
        filename: &str,
        extension: &str,
        directory: MediaDirectory,
    ) -> io::Result<PathBuf> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let destination = self.allocate_path(filename, extension, directory).await?;
            let target = destination.clone();
            let persisted = run_blocking(move || staged.persist_noclobber(&target).map(|_| ())).await?;
            match persisted {
                Ok(_) => {
                    debug!("Committed {}", destination.display());
                    return Ok(destination);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Lost race for {}, retrying", destination.display());
                    staged = e.file;
                }
                Err(e) => return Err(e.error),
            }
        }

        warn!("Could not find a free name for {} after {} attempts", filename, MAX_COMMIT_ATTEMPTS);
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free destination name for {}", filename),
        ))
    }

    /// Copy `source` byte-for-byte into the library.
    pub async fn copy_into(
        &self,
        source: &Path,
        filename: &str,
        extension: &str,
        directory: MediaDirectory,
    ) -> io::Result<PathBuf> {
        let staged = self.stage(directory, extension).await?;
        tokio::fs::copy(source, staged.path()).await?;
        self.commit(staged, filename, extension, directory).await
    }

    /// Write `bytes` into the library as a new file.
    pub async fn write_into(
        &self,
        bytes: &[u8],
        filename: &str,
        extension: &str,
        directory: MediaDirectory,
    ) -> io::Result<PathBuf> {
        let staged = self.stage(directory, extension).await?;
        tokio::fs::write(staged.path(), bytes).await?;
        self.commit(staged, filename, extension, directory).await
    }
}

/// Run a blocking filesystem call on the blocking pool
async fn run_blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

fn sanitized_stem(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim();

    if stem.is_empty() || stem.starts_with('.') {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

fn file_name(stem: &str, suffix: Option<usize>, extension: &str) -> String {
    let base = match suffix {
        Some(n) => format!("{}-{}", stem, n),
        None => stem.to_string(),
    };
    if extension.is_empty() {
        base
    } else {
        format!("{}.{}", base, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_parsing() {
        assert_eq!("uploads".parse::<MediaDirectory>(), Ok(MediaDirectory::Uploads));
        assert_eq!("Cache".parse::<MediaDirectory>(), Ok(MediaDirectory::Cache));
        assert!("downloads".parse::<MediaDirectory>().is_err());
    }

    #[test]
    fn test_stem_sanitizing() {
        assert_eq!(sanitized_stem("cat.gif"), "cat");
        assert_eq!(sanitized_stem("../../etc/passwd"), "passwd");
        assert_eq!(sanitized_stem(""), FALLBACK_STEM);
        assert_eq!(sanitized_stem(".hidden"), FALLBACK_STEM);
    }

    #[tokio::test]
    async fn test_allocate_appends_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let library = MediaLibrary::new(temp_dir.path());

        let first = library
            .allocate_path("cat.GIF", "gif", MediaDirectory::Uploads)
            .await
            .unwrap();
        assert_eq!(first.file_name().unwrap(), "cat.gif");

        tokio::fs::write(&first, b"taken").await.unwrap();
        let second = library
            .allocate_path("cat.GIF", "gif", MediaDirectory::Uploads)
            .await
            .unwrap();
        assert_eq!(second.file_name().unwrap(), "cat-1.gif");

        tokio::fs::write(&second, b"taken").await.unwrap();
        let third = library
            .allocate_path("cat.GIF", "gif", MediaDirectory::Uploads)
            .await
            .unwrap();
        assert_eq!(third.file_name().unwrap(), "cat-2.gif");
    }

    #[tokio::test]
    async fn test_commit_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let library = MediaLibrary::new(temp_dir.path());

        let a = library
            .write_into(b"first", "clip.mp4", "mp4", MediaDirectory::Cache)
            .await
            .unwrap();
        let b = library
            .write_into(b"second", "clip.mp4", "mp4", MediaDirectory::Cache)
            .await
            .unwrap();

        assert_ne!(a, b);
        assert_eq!(tokio::fs::read(&a).await.unwrap(), b"first");
        assert_eq!(tokio::fs::read(&b).await.unwrap(), b"second");
        assert!(a.starts_with(temp_dir.path().join("cache")));
    }

    #[tokio::test]
    async fn test_failed_copy_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let library = MediaLibrary::new(temp_dir.path());

        let missing = temp_dir.path().join("missing.gif");
        let result = library
            .copy_into(&missing, "missing.gif", "gif", MediaDirectory::Uploads)
            .await;
        assert!(result.is_err());

        let uploads = library.directory_path(MediaDirectory::Uploads);
        let mut entries = tokio::fs::read_dir(&uploads).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_writes_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let library = MediaLibrary::new(temp_dir.path());

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let library = library.clone();
                tokio::spawn(async move {
                    let contents = format!("frame {}", i);
                    let path = library
                        .write_into(contents.as_bytes(), "frame.png", "png", MediaDirectory::Temporary)
                        .await
                        .unwrap();
                    (path, contents)
                })
            })
            .collect();

        let mut paths = std::collections::HashSet::new();
        for handle in handles {
            let (path, contents) = handle.await.unwrap();
            assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), contents);
            assert!(paths.insert(path));
        }

        let mut entries = tokio::fs::read_dir(library.directory_path(MediaDirectory::Temporary))
            .await
            .unwrap();
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().starts_with(".export-"));
            count += 1;
        }
        assert_eq!(count, 12);
    }
}
