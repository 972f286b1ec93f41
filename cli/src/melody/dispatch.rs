use super::{render::RenderedAsset, MelodyError};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tempfile::NamedTempFile;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

/// How long a staged asset outlives the save that consumed it.
pub const RELEASE_DELAY: Duration = Duration::from_secs(1);

/// Final destination of a download.
pub trait SaveTarget: Send + Sync {
    /// Saves the staged file under `filename` and returns where it landed.
    fn save(&self, staged: &Path, filename: &str) -> io::Result<PathBuf>;
}

/// Copies downloads into a directory, creating it when missing.
#[derive(Debug, Clone)]
pub struct DirectoryTarget {
    dir: PathBuf,
}

impl DirectoryTarget {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SaveTarget for DirectoryTarget {
    fn save(&self, staged: &Path, filename: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(filename);
        fs::copy(staged, &target)?;
        Ok(target)
    }
}

#[derive(Debug)]
pub struct SavedDownload {
    path: PathBuf,
    release: JoinHandle<()>,
}

impl SavedDownload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the staged copy to be released.
    pub async fn released(self) -> PathBuf {
        if let Err(err) = self.release.await {
            warn!("staged download release did not complete: {err}");
        }
        self.path
    }
}

pub struct DownloadDispatcher {
    target: Arc<dyn SaveTarget>,
    release_delay: Duration,
}

impl DownloadDispatcher {
    pub fn new(target: Arc<dyn SaveTarget>) -> Self {
        Self { target, release_delay: RELEASE_DELAY }
    }

    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = delay;
        self
    }

    /// Stages the asset, issues exactly one save, then releases the staged
    /// copy after the release delay.
    pub async fn save(
        &self,
        asset: RenderedAsset,
        filename: &str,
    ) -> Result<SavedDownload, MelodyError> {
        let dispatch_error = |source: io::Error| MelodyError::Dispatch {
            filename: filename.to_string(),
            source,
        };
        if !is_bare_filename(filename) {
            return Err(dispatch_error(io::Error::new(
                io::ErrorKind::InvalidInput,
                "download name must be a plain file name",
            )));
        }

        let target = self.target.clone();
        let name = filename.to_string();
        let (staged, path) = tokio::task::spawn_blocking(move || -> io::Result<_> {
            let mut staged = tempfile::Builder::new().prefix("moodtone-").suffix(".wav").tempfile()?;
            staged.write_all(asset.bytes())?;
            staged.flush()?;
            debug!(staged = %staged.path().display(), "staged download");
            let path = target.save(staged.path(), &name)?;
            Ok((staged, path))
        })
        .await
        .map_err(|err| dispatch_error(io::Error::new(io::ErrorKind::Other, err)))?
        .map_err(dispatch_error)?;

        info!(path = %path.display(), "download saved");
        let release = tokio::spawn(release_later(staged, self.release_delay));
        Ok(SavedDownload { path, release })
    }
}

async fn release_later(staged: NamedTempFile, delay: Duration) {
    sleep(delay).await;
    let staged_path = staged.path().to_path_buf();
    match staged.close() {
        Ok(()) => debug!(staged = %staged_path.display(), "released staged download"),
        Err(err) => warn!("failed to release staged download {}: {err}", staged_path.display()),
    }
}

fn is_bare_filename(filename: &str) -> bool {
    !filename.trim().is_empty()
        && Path::new(filename).file_name().and_then(|name| name.to_str()) == Some(filename)
}
