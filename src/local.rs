use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::KiraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalMode {
    Copy,
    Symlink,
}

/// Places a local file into `destination_dir` under its own basename.
pub fn fetch_local(
    source: &Path,
    destination_dir: &Path,
    mode: LocalMode,
) -> Result<PathBuf, KiraError> {
    info!("Treating as local path");
    if !source.exists() {
        return Err(KiraError::LocalPathNotFound(source.to_path_buf()));
    }
    let name = source
        .file_name()
        .ok_or_else(|| KiraError::InvalidLocator(source.display().to_string()))?;
    let local_path = destination_dir.join(name);

    match mode {
        LocalMode::Copy => {
            info!("Copying into temporary folder");
            fs::copy(source, &local_path).map_err(|err| {
                KiraError::Filesystem(format!("copy {}: {err}", source.display()))
            })?;
        }
        LocalMode::Symlink => {
            info!("Making symbolic link in temporary folder");
            let target = fs::canonicalize(source).map_err(|err| {
                KiraError::Filesystem(format!("resolve {}: {err}", source.display()))
            })?;
            link(&target, &local_path)?;
        }
    }
    Ok(local_path)
}

#[cfg(unix)]
fn link(target: &Path, link: &Path) -> Result<(), KiraError> {
    std::os::unix::fs::symlink(target, link)
        .map_err(|err| KiraError::Filesystem(format!("symlink {}: {err}", link.display())))
}

#[cfg(not(unix))]
fn link(target: &Path, link: &Path) -> Result<(), KiraError> {
    fs::copy(target, link)
        .map(|_| ())
        .map_err(|err| KiraError::Filesystem(format!("copy {}: {err}", target.display())))
}
