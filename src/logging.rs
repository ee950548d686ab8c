use std::error::Error as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::dispatcher::DefaultGuard;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::error::KiraError;

/// Logging context for one pipeline run.
///
/// Events go to stdout and to the run's log file. The subscriber is the
/// scoped default for as long as the `RunLog` lives.
pub struct RunLog {
    path: PathBuf,
    guard: Option<DefaultGuard>,
}

impl RunLog {
    pub fn init(path: &Path) -> Result<Self, KiraError> {
        let file = File::create(path).map_err(|err| {
            KiraError::Filesystem(format!("create log {}: {err}", path.display()))
        })?;
        let writer = std::io::stdout.and(Arc::new(file));
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Ok(Self {
            path: path.to_path_buf(),
            guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops logging for this run.
    pub fn finish(mut self) {
        self.guard.take();
    }
}

/// Writes the failure banner and traceback for `error` to the active log.
pub fn log_failure(error: &KiraError) {
    info!("There was an unexpected failure");
    info!("Traceback:");
    info!("  {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        info!("  caused by: {cause}");
        source = cause.source();
    }
    let backtrace = std::backtrace::Backtrace::capture();
    if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
        for line in backtrace.to_string().lines() {
            info!("  {line}");
        }
    }
}
