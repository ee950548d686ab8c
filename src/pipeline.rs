use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::assembler::{Assembler, AssemblyOptions};
use crate::domain::{
    AssemblyType, GeneticCode, ObjectLocation, PipelineVariant, parse_locator_list,
};
use crate::error::KiraError;
use crate::fastq;
use crate::fs_util;
use crate::logging::log_failure;
use crate::object_store::ObjectStore;
use crate::remote::UrlFetcher;
use crate::resolver::SourceResolver;
use crate::sra::SraClient;
use crate::workdir::WorkDir;

pub const ASSEMBLY_OUTPUT: &str = "output.fastp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Init,
    CacheSetup,
    Fetch,
    Pair,
    Assemble,
    Upload,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub variant: PipelineVariant,
    pub input: String,
    pub output_fastp: String,
    pub output_log: String,
    pub assembly_type: AssemblyType,
    pub temp_folder: PathBuf,
    pub genetic_code: GeneticCode,
    pub threads: usize,
}

impl PipelineSettings {
    pub fn assembly_options(&self) -> AssemblyOptions {
        if self.variant.tunes_assembler() {
            AssemblyOptions {
                genetic_code: Some(self.genetic_code),
                threads: Some(self.threads),
                unfiltered: true,
            }
        } else {
            AssemblyOptions::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub variant: PipelineVariant,
    pub assembly_type: AssemblyType,
    pub inputs: Vec<String>,
    pub output_fastp: String,
    pub output_log: String,
    pub started_at: String,
    pub finished_at: String,
    pub states: Vec<PipelineState>,
}

/// Drives one run: cache setup, fetch, pairing, assembly and upload.
pub struct Pipeline<O, U, S, A>
where
    O: ObjectStore,
    U: UrlFetcher,
    S: SraClient,
    A: Assembler,
{
    resolver: SourceResolver<O, U, S>,
    assembler: A,
    states: Vec<PipelineState>,
}

impl<O, U, S, A> Pipeline<O, U, S, A>
where
    O: ObjectStore,
    U: UrlFetcher,
    S: SraClient,
    A: Assembler,
{
    pub fn new(resolver: SourceResolver<O, U, S>, assembler: A) -> Self {
        Self {
            resolver,
            assembler,
            states: vec![PipelineState::Init],
        }
    }

    /// States visited so far, in order.
    pub fn states(&self) -> &[PipelineState] {
        &self.states
    }

    pub fn state(&self) -> PipelineState {
        self.states
            .last()
            .copied()
            .unwrap_or(PipelineState::Init)
    }

    /// Runs the pipeline. The working directory `<temp_folder>/<run_id>`
    /// is removed whatever the outcome; on failure the error is logged
    /// with its traceback and returned.
    pub fn run(
        &mut self,
        settings: &PipelineSettings,
        run_id: Uuid,
        log_path: &Path,
    ) -> Result<RunSummary, KiraError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let workdir = WorkDir::create(&settings.temp_folder, run_id)?;

        match self.run_stages(settings, &workdir, log_path) {
            Ok(inputs) => {
                self.enter(PipelineState::Done);
                info!("Done");
                workdir.close()?;
                Ok(RunSummary {
                    run_id: run_id.to_string(),
                    variant: settings.variant,
                    assembly_type: settings.assembly_type,
                    inputs,
                    output_fastp: settings.output_fastp.clone(),
                    output_log: settings.output_log.clone(),
                    started_at,
                    finished_at: chrono::Utc::now().to_rfc3339(),
                    states: self.states.clone(),
                })
            }
            Err(err) => {
                self.enter(PipelineState::Failed);
                log_failure(&err);
                if let Err(cleanup) = workdir.close() {
                    tracing::warn!("{cleanup}");
                }
                info!("Exit type: {err:?}");
                info!("Exit code: {}", err.exit_code());
                Err(err)
            }
        }
    }

    fn run_stages(
        &mut self,
        settings: &PipelineSettings,
        workdir: &WorkDir,
        log_path: &Path,
    ) -> Result<Vec<String>, KiraError> {
        let scratch = workdir.as_std_path();

        if settings.variant.configures_sra_cache() {
            self.enter(PipelineState::CacheSetup);
            self.resolver.sra().configure_cache(&scratch.join("sra_cache"))?;
        }

        self.enter(PipelineState::Fetch);
        let locators = parse_locator_list(&settings.input)?;
        let mut inputs = Vec::with_capacity(locators.len());
        for locator in &locators {
            inputs.push(self.resolver.fetch(locator, scratch)?);
        }

        if settings.assembly_type == AssemblyType::Paired {
            self.enter(PipelineState::Pair);
            inputs = pair_inputs(inputs, scratch)?;
        }

        self.enter(PipelineState::Assemble);
        let assembly = scratch.join(ASSEMBLY_OUTPUT);
        self.assembler
            .assemble(&inputs, &assembly, scratch, &settings.assembly_options())?;
        if !assembly.exists() {
            return Err(KiraError::AssemblyOutputMissing(assembly));
        }

        self.enter(PipelineState::Upload);
        upload_file(self.resolver.object_store(), &assembly, &settings.output_fastp)?;
        upload_file(self.resolver.object_store(), log_path, &settings.output_log)?;

        Ok(inputs
            .iter()
            .map(|path| path.display().to_string())
            .collect())
    }

    fn enter(&mut self, state: PipelineState) {
        info!("phase={state:?}");
        self.states.push(state);
    }
}

/// Prepares fetched files for a paired assembly.
///
/// Two files are taken as forward and reverse mates. Any other count means
/// each file is interleaved and gets split into `_1`/`_2` mate files,
/// replacing the interleaved original.
pub fn pair_inputs(inputs: Vec<PathBuf>, workdir: &Path) -> Result<Vec<PathBuf>, KiraError> {
    if inputs.len() == 2 {
        info!("Using the two inputs as forward and reverse reads");
        return Ok(inputs);
    }
    let mut paired = Vec::with_capacity(inputs.len() * 2);
    for input in inputs {
        let stem = fastq_stem(&input);
        let forward = workdir.join(format!("{stem}_1.fastq"));
        let reverse = workdir.join(format!("{stem}_2.fastq"));
        info!("Deinterleaving {}", input.display());
        fastq::deinterleave(&input, &forward, &reverse)?;
        fs_util::remove_file(&input)?;
        paired.push(forward);
        paired.push(reverse);
    }
    Ok(paired)
}

fn fastq_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "reads".to_string());
    let mut stem = name.as_str();
    if let Some(rest) = stem.strip_suffix(".gz") {
        stem = rest;
    }
    for ext in [".fastq", ".fq"] {
        if let Some(rest) = stem.strip_suffix(ext) {
            stem = rest;
            break;
        }
    }
    stem.to_string()
}

/// Copies to S3 or moves to a local path.
pub fn upload_file<O: ObjectStore + ?Sized>(
    store: &O,
    local: &Path,
    destination: &str,
) -> Result<(), KiraError> {
    if local.to_string_lossy().ends_with('/') {
        return Err(KiraError::InvalidDestination(local.display().to_string()));
    }
    if destination.ends_with('/') {
        return Err(KiraError::InvalidDestination(destination.to_string()));
    }
    info!("Uploading {} to {destination}", local.display());
    if destination.starts_with("s3://") {
        let location: ObjectLocation = destination.parse()?;
        store.upload(local, &location)
    } else {
        fs_util::move_file(local, Path::new(destination))
    }
}
