use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::domain::{PipelineVariant, SourceScheme};
use crate::error::KiraError;
use crate::local::{self, LocalMode};
use crate::object_store::ObjectStore;
use crate::remote::UrlFetcher;
use crate::sra::{self, SraClient};

/// Turns a read source locator into a non-empty file inside the working
/// directory.
pub struct SourceResolver<O: ObjectStore, U: UrlFetcher, S: SraClient> {
    object_store: O,
    url_fetcher: U,
    sra: S,
    variant: PipelineVariant,
}

impl<O: ObjectStore, U: UrlFetcher, S: SraClient> SourceResolver<O, U, S> {
    pub fn new(object_store: O, url_fetcher: U, sra: S, variant: PipelineVariant) -> Self {
        Self {
            object_store,
            url_fetcher,
            sra,
            variant,
        }
    }

    pub fn object_store(&self) -> &O {
        &self.object_store
    }

    pub fn sra(&self) -> &S {
        &self.sra
    }

    pub fn resolve(&self, locator: &str, destination_dir: &Path) -> Result<PathBuf, KiraError> {
        let scheme: SourceScheme = locator.parse()?;
        self.fetch(&scheme, destination_dir)
    }

    pub fn fetch(
        &self,
        scheme: &SourceScheme,
        destination_dir: &Path,
    ) -> Result<PathBuf, KiraError> {
        info!("Getting reads from {scheme}");
        let local_path = match scheme {
            SourceScheme::ObjectStore(location) => {
                self.object_store.download(location, destination_dir)?
            }
            SourceScheme::Archive { accessions } => {
                if !self.variant.supports_archive() {
                    return Err(KiraError::UnrecognizedScheme(scheme.to_string()));
                }
                sra::fetch_accessions(&self.sra, accessions, destination_dir)?
            }
            SourceScheme::Remote(url) => self.url_fetcher.fetch(url, destination_dir)?,
            SourceScheme::Local(path) => {
                let mode = if self.variant.links_local_inputs() {
                    LocalMode::Symlink
                } else {
                    LocalMode::Copy
                };
                local::fetch_local(path, destination_dir, mode)?
            }
        };
        let size = fs::metadata(&local_path).map(|meta| meta.len()).map_err(|_| {
            KiraError::Filesystem(format!(
                "{} fetch did not produce {}",
                scheme.kind(),
                local_path.display()
            ))
        })?;
        if size == 0 {
            return Err(KiraError::Filesystem(format!(
                "{} fetch produced an empty file {}",
                scheme.kind(),
                local_path.display()
            )));
        }
        info!("Local path: {}", local_path.display());
        Ok(local_path)
    }
}
