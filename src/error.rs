use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("did not recognize prefix to fetch reads: {0}")]
    UnrecognizedScheme(String),

    #[error("invalid read source locator: {0}")]
    InvalidLocator(String),

    #[error("local path not found: {}", .0.display())]
    LocalPathNotFound(PathBuf),

    #[error(
        "unbalanced read pair: {} and {} differ in record count after {pairs} pairs",
        .forward.display(),
        .reverse.display()
    )]
    UnbalancedPair {
        forward: PathBuf,
        reverse: PathBuf,
        pairs: u64,
    },

    #[error("malformed FASTQ record #{record} in {}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        record: u64,
        reason: String,
    },

    #[error("command `{command}` failed with exit code {code}")]
    ExternalCommandFailed { command: String, code: i32 },

    #[error("assembler did not produce output file {}", .0.display())]
    AssemblyOutputMissing(PathBuf),

    #[error("invalid SRA accession: {0}")]
    InvalidAccession(String),

    #[error("invalid genetic code: {0} (expected an NCBI translation table id)")]
    #[diagnostic(help("valid tables: 1-6, 9-16, 21-31"))]
    InvalidGeneticCode(String),

    #[error("invalid upload destination: {0}")]
    InvalidDestination(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP server returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("failed to read config file at {}", .0.display())]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl KiraError {
    /// Process exit status for a failed run.
    pub fn exit_code(&self) -> u8 {
        match self {
            KiraError::UnrecognizedScheme(_)
            | KiraError::InvalidLocator(_)
            | KiraError::LocalPathNotFound(_)
            | KiraError::InvalidAccession(_)
            | KiraError::InvalidGeneticCode(_)
            | KiraError::InvalidDestination(_)
            | KiraError::ConfigRead(_)
            | KiraError::ConfigParse(_) => 2,
            KiraError::ExternalCommandFailed { .. }
            | KiraError::MissingTool(_)
            | KiraError::Http(_)
            | KiraError::HttpStatus { .. } => 3,
            KiraError::UnbalancedPair { .. } | KiraError::MalformedRecord { .. } => 4,
            KiraError::AssemblyOutputMissing(_) => 5,
            KiraError::Filesystem(_) => 1,
        }
    }
}
