//! Local file storage for downloaded resources
//!
//! Files are named after the final path segment of their URL, so saving the
//! same URL twice is a no-op. Each attempt streams into its own
//! `<name>.<random>.part` file, which is only renamed into place once fully
//! written. Concurrent attempts on one name never share a staging file, and a
//! failed or interrupted attempt never leaves a truncated file behind.

use crate::config::StorageConfig;
use crate::fetch::{ByteStream, FetchError, Fetcher};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Transfer interrupted: {0}")]
    Transfer(#[source] io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SaveError>;

/// Successful save result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { path: PathBuf, bytes: u64 },
    /// Destination already present; nothing was fetched
    AlreadyExists { path: PathBuf },
}

impl SaveOutcome {
    pub fn path(&self) -> &Path {
        match self {
            SaveOutcome::Saved { path, .. } | SaveOutcome::AlreadyExists { path } => path,
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> SaveError + '_ {
    move |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Per-attempt staging file next to `dest`
fn staging_path(dest: &Path) -> PathBuf {
    let name = dest.file_name().unwrap_or_default().to_string_lossy();
    dest.with_file_name(format!("{name}.{:016x}.part", rand::random::<u64>()))
}

/// Removes the partial file on drop unless the download was committed
struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Save directory plus copy settings
#[derive(Debug, Clone)]
pub struct LocalStorage {
    save_dir: PathBuf,
    chunk_size: usize,
}

impl LocalStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            save_dir: config.save_dir.clone(),
            chunk_size: config.chunk_size.as_usize().max(1),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Destination path for a URL: its last non-empty path segment, percent-decoded
    pub fn destination(&self, url: &str) -> Result<PathBuf> {
        let invalid = |reason: &str| SaveError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let segment = parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .ok_or_else(|| invalid("no file name in path"))?;

        let name = urlencoding::decode(segment)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| segment.to_string());

        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(invalid("unsafe file name"));
        }

        Ok(self.save_dir.join(name))
    }

    /// Download `url` into the save directory unless it is already there
    pub async fn save_resource(&self, fetcher: &dyn Fetcher, url: &str) -> Result<SaveOutcome> {
        let path = self.destination(url)?;

        fs::create_dir_all(&self.save_dir)
            .await
            .map_err(io_error(&self.save_dir))?;

        if fs::try_exists(&path).await.map_err(io_error(&path))? {
            debug!(url, path = %path.display(), "Already downloaded");
            return Ok(SaveOutcome::AlreadyExists { path });
        }

        let stream = fetcher.open_stream(url).await?;

        let mut part = PartFile::new(staging_path(&path));
        let bytes = self.copy_stream(stream, &part.path).await?;

        fs::rename(&part.path, &path)
            .await
            .map_err(io_error(&path))?;
        part.committed = true;

        debug!(url, bytes, path = %path.display(), "Saved");
        Ok(SaveOutcome::Saved { path, bytes })
    }

    /// Copy in `chunk_size` pieces; both handles close when this returns
    async fn copy_stream(&self, stream: ByteStream, dest: &Path) -> Result<u64> {
        let mut reader = StreamReader::new(stream);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dest)
            .await
            .map_err(io_error(dest))?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf).await.map_err(SaveError::Transfer)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await.map_err(io_error(dest))?;
            total += n as u64;
        }

        file.flush().await.map_err(io_error(dest))?;
        Ok(total)
    }
}
