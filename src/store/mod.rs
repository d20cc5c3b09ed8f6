//! Filesystem-backed media store.
//!
//! All paths handed to the store are relative to its root. Anything that
//! would escape the root is reported as not found rather than as a distinct
//! error, so clients cannot probe the layout outside the videos directory.

use chrono::{DateTime, Utc};
use reelhouse_common::paths::{sniff_video, SNIFF_LEN, VARIANT_EXTENSION};
use reelhouse_common::{quality, Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

/// Snapshot of a stored file taken at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    /// Path relative to the store root.
    pub relative: PathBuf,
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// An original video as shown in the library listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoEntry {
    pub filename: String,
    /// File name without its extension.
    pub title: String,
    /// Container detected from the file's leading bytes.
    pub content_type: &'static str,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Media store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if needed.
    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Join a client-supplied relative path onto the root.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let relative = relative.as_ref();
        let display = relative.display().to_string();

        if relative.as_os_str().is_empty() {
            return Err(Error::not_found(display));
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::not_found(display));
        }

        Ok(self.root.join(relative))
    }

    /// Stat a file. Directories and missing paths are both "not found".
    pub async fn stat(&self, relative: impl AsRef<Path>) -> Result<MediaAsset> {
        let relative = relative.as_ref();
        let path = self.resolve(relative)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found(relative.display().to_string()));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        if !metadata.is_file() {
            return Err(Error::not_found(relative.display().to_string()));
        }

        let modified = metadata.modified()?;

        Ok(MediaAsset {
            relative: relative.to_path_buf(),
            path,
            size: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
        })
    }

    /// Whether a regular file exists at `relative`.
    pub async fn exists(&self, relative: impl AsRef<Path>) -> bool {
        self.stat(relative).await.is_ok()
    }

    /// Open a previously stat'ed asset for reading.
    pub async fn open(&self, asset: &MediaAsset) -> Result<File> {
        match File::open(&asset.path).await {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(asset.relative.display().to_string()))
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// List the original videos directly under the root, sorted by name.
    ///
    /// Files whose leading bytes are not a known video container are left
    /// out, as are hidden files (in-flight uploads) and quality variants of
    /// another listed video.
    pub async fn list_videos(&self) -> Result<Vec<VideoEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut videos = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if filename.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let content_type = match sniff_file(&entry.path()).await {
                Ok(Some(kind)) => kind,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("Skipping unreadable file {filename}: {e}");
                    continue;
                }
            };

            let title = Path::new(&filename)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.clone());

            videos.push(VideoEntry {
                filename,
                title,
                content_type,
                size: metadata.len(),
                modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }

        let titles: HashSet<String> = videos.iter().map(|v| v.title.clone()).collect();
        videos.retain(|v| {
            variant_base(&v.filename).map_or(true, |base| !titles.contains(base))
        });
        videos.sort_by(|a, b| a.filename.cmp(&b.filename));

        Ok(videos)
    }

    /// Start writing a new file named `file_name` directly under the root.
    ///
    /// Data goes to a hidden temporary file which only appears under its
    /// final name after [`UploadSink::commit`].
    pub async fn begin_upload(&self, file_name: &str) -> Result<UploadSink> {
        let dest = self.resolve(file_name)?;
        if dest.parent() != Some(self.root.as_path()) {
            return Err(Error::invalid_input(format!(
                "upload name must be a bare file name: {file_name}"
            )));
        }
        self.ensure_root().await?;

        // Unique per sink so concurrent uploads of one name never share a
        // temp file; the last commit wins.
        let temp = self
            .root
            .join(format!(".{file_name}.{}.upload", Uuid::new_v4().simple()));
        let file = File::create_new(&temp).await?;

        Ok(UploadSink {
            file: Some(file),
            temp,
            dest,
            written: 0,
        })
    }
}

/// Read the leading bytes of a file and identify its container.
async fn sniff_file(path: &Path) -> std::io::Result<Option<&'static str>> {
    let file = File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(sniff_video(&head))
}

/// For a name shaped like `<base>_<quality>.mp4`, the `<base>` part.
fn variant_base(filename: &str) -> Option<&str> {
    let stem = filename
        .strip_suffix(VARIANT_EXTENSION)?
        .strip_suffix('.')?;
    quality::all()
        .iter()
        .find_map(|q| stem.strip_suffix(q.name)?.strip_suffix('_'))
}

/// In-progress upload. Dropping it without committing discards the data.
#[derive(Debug)]
pub struct UploadSink {
    file: Option<File>,
    temp: PathBuf,
    dest: PathBuf,
    written: u64,
}

impl UploadSink {
    /// Append a chunk of data.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::internal("upload already committed"))?;
        file.write_all(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and move the file to its final name, returning the final path.
    pub async fn commit(mut self) -> Result<PathBuf> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&self.temp, &self.dest).await?;
        Ok(self.dest.clone())
    }
}

impl Drop for UploadSink {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            if let Err(e) = std::fs::remove_file(&self.temp) {
                tracing::debug!("Failed to discard upload {}: {e}", self.temp.display());
            }
        }
    }
}
