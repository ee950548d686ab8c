use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{CommandRunner, RunPolicy, argv};
use crate::config::ResolvedConfig;
use crate::domain::ObjectLocation;
use crate::error::KiraError;

pub trait ObjectStore {
    /// Copies the object into `destination_dir`, keeping its basename.
    fn download(
        &self,
        location: &ObjectLocation,
        destination_dir: &Path,
    ) -> Result<PathBuf, KiraError>;

    fn upload(&self, local: &Path, location: &ObjectLocation) -> Result<(), KiraError>;
}

/// S3 access through the `aws` CLI with AES256 server-side encryption.
#[derive(Clone)]
pub struct AwsCliObjectStore<R: CommandRunner> {
    runner: R,
    program: String,
    retries: u32,
}

impl<R: CommandRunner> AwsCliObjectStore<R> {
    pub fn new(runner: R, config: &ResolvedConfig) -> Self {
        Self {
            runner,
            program: config.tools.aws.clone(),
            retries: config.command_retries,
        }
    }

    fn copy_argv(&self, source: &str, destination: &str) -> Vec<String> {
        argv([
            self.program.as_str(),
            "s3",
            "cp",
            "--quiet",
            "--sse",
            "AES256",
            source,
            destination,
        ])
    }
}

impl<R: CommandRunner> ObjectStore for AwsCliObjectStore<R> {
    fn download(
        &self,
        location: &ObjectLocation,
        destination_dir: &Path,
    ) -> Result<PathBuf, KiraError> {
        info!("Getting reads from S3");
        let mut dir = destination_dir.to_string_lossy().to_string();
        if !dir.ends_with('/') {
            dir.push('/');
        }
        let args = self.copy_argv(&location.uri(), &dir);
        self.runner.run(&args, RunPolicy::retrying(self.retries))?;
        Ok(destination_dir.join(location.basename()))
    }

    fn upload(&self, local: &Path, location: &ObjectLocation) -> Result<(), KiraError> {
        let args = self.copy_argv(&local.to_string_lossy(), &location.uri());
        self.runner.run(&args, RunPolicy::retrying(self.retries))?;
        Ok(())
    }
}
