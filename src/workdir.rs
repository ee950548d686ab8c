use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempDir};
use tracing::info;
use uuid::Uuid;

use crate::error::KiraError;

/// The per-run scratch directory `<root>/<run id>`.
///
/// The directory is removed when the guard is closed or dropped, so every
/// exit path of a run cleans it up.
pub struct WorkDir {
    dir: Option<TempDir>,
    path: Utf8PathBuf,
}

impl WorkDir {
    /// Creates `<root>/<id>`; fails if it already exists.
    pub fn create(root: &Path, id: Uuid) -> Result<Self, KiraError> {
        fs::create_dir_all(root)
            .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", root.display())))?;
        let dir = Builder::new()
            .prefix(&id.to_string())
            .rand_bytes(0)
            .tempdir_in(root)
            .map_err(|err| {
                KiraError::Filesystem(format!("create working directory in {}: {err}", root.display()))
            })?;
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|_| KiraError::Filesystem("non-utf8 working directory path".to_string()))?;
        info!("Working directory: {path}");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn as_std_path(&self) -> &Path {
        self.path.as_std_path()
    }

    /// Removes the directory, reporting any failure.
    pub fn close(mut self) -> Result<(), KiraError> {
        match self.dir.take() {
            Some(dir) => {
                info!("Removing temporary folder: {}", self.path);
                dir.close()
                    .map_err(|err| KiraError::Filesystem(format!("remove {}: {err}", self.path)))
            }
            None => Ok(()),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            info!("Removing temporary folder: {}", self.path);
            if let Err(err) = dir.close() {
                tracing::warn!("failed to remove {}: {err}", self.path);
            }
        }
    }
}
