use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser};
use tracing::info;
use uuid::Uuid;

use crate::assembler::PlassAssembler;
use crate::command::SystemCommandRunner;
use crate::config::ConfigLoader;
use crate::domain::{AssemblyType, GeneticCode, PipelineVariant};
use crate::error::KiraError;
use crate::logging::{RunLog, log_failure};
use crate::object_store::AwsCliObjectStore;
use crate::output::JsonOutput;
use crate::pipeline::{Pipeline, PipelineSettings, RunSummary};
use crate::remote::HttpUrlFetcher;
use crate::resolver::SourceResolver;
use crate::sra::SystemSraClient;

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Location for input file(s), comma-separated (sra://, s3://, ftp://, http(s):// or a local path).
    #[arg(long)]
    pub input: String,

    /// Path to write the assembly in FASTP format (s3:// or local path).
    #[arg(long)]
    pub output_fastp: String,

    /// Path to write logs (s3:// or local path).
    #[arg(long)]
    pub output_log: String,

    #[arg(long, value_enum, default_value_t = AssemblyType::Unpaired)]
    pub assembly_type: AssemblyType,

    /// Folder used for temporary files.
    #[arg(long, default_value = "/scratch")]
    pub temp_folder: PathBuf,

    /// JSON config with tool paths and retry settings.
    #[arg(long)]
    pub config: Option<String>,

    /// Print a JSON run summary on success.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(name = "kira-plass")]
#[command(about = "Wrapper for Plass: fetches reads, assembles proteins, uploads results")]
#[command(version, author)]
pub struct LegacyCli {
    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(name = "kira-plass-extended")]
#[command(about = "Wrapper for Plass with translation table and thread control")]
#[command(version, author)]
pub struct ExtendedCli {
    #[command(flatten)]
    pub common: CommonArgs,

    /// NCBI genetic code (translation table) used by Plass.
    #[arg(long, default_value_t = GeneticCode::default())]
    pub genetic_code: GeneticCode,

    /// Threads handed to Plass; must be at least 1.
    #[arg(long, default_value_t = NonZeroUsize::MIN)]
    pub threads: NonZeroUsize,
}

impl LegacyCli {
    pub fn settings(&self) -> PipelineSettings {
        settings_from(
            &self.common,
            PipelineVariant::Legacy,
            GeneticCode::default(),
            1,
        )
    }
}

impl ExtendedCli {
    pub fn settings(&self) -> PipelineSettings {
        settings_from(
            &self.common,
            PipelineVariant::Extended,
            self.genetic_code,
            self.threads.get(),
        )
    }
}

fn settings_from(
    common: &CommonArgs,
    variant: PipelineVariant,
    genetic_code: GeneticCode,
    threads: usize,
) -> PipelineSettings {
    PipelineSettings {
        variant,
        input: common.input.clone(),
        output_fastp: common.output_fastp.clone(),
        output_log: common.output_log.clone(),
        assembly_type: common.assembly_type,
        temp_folder: common.temp_folder.clone(),
        genetic_code,
        threads,
    }
}

/// Runs one pipeline with the system tools, logging to `<run id>.log.txt`.
pub fn execute(
    settings: &PipelineSettings,
    config_path: Option<&str>,
    json: bool,
) -> Result<RunSummary, KiraError> {
    let run_id = Uuid::new_v4();
    let log_path = PathBuf::from(format!("{run_id}.log.txt"));
    let run_log = RunLog::init(&log_path)?;
    info!("Run {run_id} ({} variant)", settings.variant);

    let result = build_and_run(settings, config_path, run_id, run_log.path());
    if let (true, Ok(summary)) = (json, &result) {
        JsonOutput::print_summary(summary)
            .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    }
    run_log.finish();
    result
}

fn build_and_run(
    settings: &PipelineSettings,
    config_path: Option<&str>,
    run_id: Uuid,
    log_path: &Path,
) -> Result<RunSummary, KiraError> {
    let config = ConfigLoader::resolve(config_path).inspect_err(log_failure)?;
    let runner = Arc::new(SystemCommandRunner::new());
    let url_fetcher = HttpUrlFetcher::new(runner.clone(), &config).inspect_err(log_failure)?;
    let resolver = SourceResolver::new(
        AwsCliObjectStore::new(runner.clone(), &config),
        url_fetcher,
        SystemSraClient::new(runner.clone(), &config),
        settings.variant,
    );
    let mut pipeline = Pipeline::new(resolver, PlassAssembler::new(runner, &config));
    pipeline.run(settings, run_id, log_path)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn clap_definitions_are_consistent() {
        LegacyCli::command().debug_assert();
        ExtendedCli::command().debug_assert();
    }

    #[test]
    fn extended_defaults() {
        let cli = ExtendedCli::parse_from([
            "kira-plass-extended",
            "--input",
            "s3://bucket/reads.fq.gz",
            "--output-fastp",
            "s3://bucket/out.fastp",
            "--output-log",
            "s3://bucket/out.log",
        ]);
        let settings = cli.settings();
        assert_eq!(settings.assembly_type, AssemblyType::Unpaired);
        assert_eq!(settings.temp_folder, PathBuf::from("/scratch"));
        assert_eq!(settings.genetic_code.table(), 11);
        assert_eq!(settings.threads, 1);
        assert_eq!(settings.variant, PipelineVariant::Extended);
    }

    #[test]
    fn invalid_genetic_code_is_rejected_by_parser() {
        let result = ExtendedCli::try_parse_from([
            "kira-plass-extended",
            "--input",
            "reads.fq",
            "--output-fastp",
            "out.fastp",
            "--output-log",
            "out.log",
            "--genetic-code",
            "8",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_threads_are_rejected_by_parser() {
        let result = ExtendedCli::try_parse_from([
            "kira-plass-extended",
            "--input",
            "reads.fq",
            "--output-fastp",
            "out.fastp",
            "--output-log",
            "out.log",
            "--threads",
            "0",
        ]);
        assert!(result.is_err());
    }
}
