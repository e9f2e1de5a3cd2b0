//! On-disk content cache
//!
//! Everything the display plays lives flat in one save directory: media files
//! under their manifest path, layouts as `{path}{layout_ext}` and widget
//! resources as `{layout}_{region}_{media}{resource_ext}`. The last accepted
//! manifest and schedule are kept beside them as snapshots.
//!
//! Downloads go to a `.part` sibling first and only replace the destination
//! once the digest agrees, so a reader never sees a half-written file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use xmds_api::digest::{digest_eq, md5_reader};
use xmds_api::{EntryKind, ManifestEntry};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

const PART_SUFFIX: &str = ".part";

/// Persisted server documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    RequiredFiles,
    Schedule,
}

impl SnapshotKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            SnapshotKind::RequiredFiles => "rf.xml",
            SnapshotKind::Schedule => "schedule.xml",
        }
    }
}

/// The save directory and its naming rules
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
    resource_ext: String,
    layout_ext: String,
}

impl ContentCache {
    /// Open the cache, creating the save directory if needed
    pub fn new(
        root: impl Into<PathBuf>,
        resource_ext: impl Into<String>,
        layout_ext: impl Into<String>,
    ) -> Result<Self> {
        let root = root.into();
        create_private_dir(&root)?;
        Ok(Self {
            root,
            resource_ext: resource_ext.into(),
            layout_ext: layout_ext.into(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(&config.save_dir, &config.resource_ext, &config.layout_ext)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of a manifest entry
    pub fn path_for(&self, entry: &ManifestEntry) -> PathBuf {
        match entry.kind {
            EntryKind::Resource => {
                self.resource_path(&entry.layout_id, &entry.region_id, &entry.media_id)
            }
            EntryKind::Layout => self.root.join(format!("{}{}", entry.path, self.layout_ext)),
            EntryKind::Media | EntryKind::Unknown(_) => self.root.join(&entry.path),
        }
    }

    /// Cached XLF of a layout
    pub fn layout_path(&self, layout_id: &str) -> PathBuf {
        self.root.join(format!("{}{}", layout_id, self.layout_ext))
    }

    /// Cached HTML of a widget
    pub fn resource_path(&self, layout_id: &str, region_id: &str, media_id: &str) -> PathBuf {
        self.root.join(format!(
            "{}_{}_{}{}",
            layout_id, region_id, media_id, self.resource_ext
        ))
    }

    pub fn snapshot_path(&self, kind: SnapshotKind) -> PathBuf {
        self.root.join(kind.file_name())
    }

    /// md5 of a file, or `None` when it is missing, empty or unreadable
    pub fn file_digest(&self, path: &Path) -> Option<String> {
        let meta = fs::metadata(path).ok()?;
        if !meta.is_file() || meta.len() == 0 {
            return None;
        }
        let file = File::open(path).ok()?;
        md5_reader(file).ok()
    }

    /// Whether the file at `path` exists, is non-empty and hashes to `expected`
    pub fn digest_matches(&self, path: &Path, expected: &str) -> bool {
        match self.file_digest(path) {
            Some(actual) => digest_eq(&actual, expected),
            None => false,
        }
    }

    pub fn snapshot_matches(&self, kind: SnapshotKind, digest: &str) -> bool {
        self.digest_matches(&self.snapshot_path(kind), digest)
    }

    pub fn persist_snapshot(&self, kind: SnapshotKind, content: &str) -> Result<()> {
        self.write_atomic(&self.snapshot_path(kind), content.as_bytes())
    }

    pub fn load_snapshot(&self, kind: SnapshotKind) -> Option<String> {
        let path = self.snapshot_path(kind);
        match fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => Some(content),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no snapshot available");
                None
            }
        }
    }

    /// Write a whole file through a `.part` sibling
    pub fn write_atomic(&self, dest: &Path, content: &[u8]) -> Result<()> {
        let mut download = self.begin_download(dest)?;
        download.write_chunk(content)?;
        download.commit(None).map(|_| ())
    }

    /// Start a chunked download for `dest`
    pub fn begin_download(&self, dest: &Path) -> Result<PartialDownload> {
        let part_path = part_path(dest);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&part_path)
            .map_err(|e| SyncError::storage(&part_path, e))?;

        Ok(PartialDownload {
            dest: dest.to_path_buf(),
            part_path,
            file,
            written: 0,
        })
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    if path.is_dir() {
        return Ok(());
    }
    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
        .map_err(|e| SyncError::storage(path, e))
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| SyncError::storage(path, e))
}

/// A download in progress
///
/// Chunks are appended to the `.part` file and synced to disk one at a time.
/// Dropping without [`commit`](Self::commit) leaves the `.part` file behind
/// and the destination untouched.
#[derive(Debug)]
pub struct PartialDownload {
    dest: PathBuf,
    part_path: PathBuf,
    file: File,
    written: u64,
}

impl PartialDownload {
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk and make it durable before returning
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file
            .write_all(chunk)
            .and_then(|_| self.file.flush())
            .and_then(|_| self.file.sync_all())
            .map_err(|e| SyncError::storage(&self.part_path, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Verify against `expected` (when given and non-empty) and move into place
    pub fn commit(self, expected: Option<&str>) -> Result<PathBuf> {
        let PartialDownload {
            dest,
            part_path,
            file,
            ..
        } = self;
        drop(file);

        if let Some(expected) = expected.filter(|d| !d.trim().is_empty()) {
            let actual = File::open(&part_path)
                .and_then(md5_reader)
                .map_err(|e| SyncError::storage(&part_path, e))?;
            if !digest_eq(&actual, expected) {
                return Err(SyncError::DigestMismatch {
                    path: dest,
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        fs::rename(&part_path, &dest).map_err(|e| SyncError::storage(&dest, e))?;
        Ok(dest)
    }
}
