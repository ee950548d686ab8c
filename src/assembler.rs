use std::path::{Path, PathBuf};

use crate::command::{CommandRunner, RunPolicy};
use crate::config::ResolvedConfig;
use crate::domain::GeneticCode;
use crate::error::KiraError;

/// Tuning passed through to the assembler; `None` leaves its default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub genetic_code: Option<GeneticCode>,
    pub threads: Option<usize>,
    /// Disable k-mer length selection and protein filtering (`-k 0
    /// --filter-proteins 0`).
    pub unfiltered: bool,
}

pub trait Assembler {
    fn assemble(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        scratch: &Path,
        options: &AssemblyOptions,
    ) -> Result<(), KiraError>;
}

#[derive(Clone)]
pub struct PlassAssembler<R: CommandRunner> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> PlassAssembler<R> {
    pub fn new(runner: R, config: &ResolvedConfig) -> Self {
        Self {
            runner,
            program: config.tools.plass.clone(),
        }
    }

    pub fn assembly_argv(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        scratch: &Path,
        options: &AssemblyOptions,
    ) -> Vec<String> {
        let mut args = vec![self.program.clone(), "assemble".to_string()];
        args.extend(inputs.iter().map(|path| path.to_string_lossy().to_string()));
        args.push(output.to_string_lossy().to_string());
        args.push(scratch.to_string_lossy().to_string());
        if let Some(code) = options.genetic_code {
            args.push("--translation-table".to_string());
            args.push(code.to_string());
        }
        if let Some(threads) = options.threads {
            args.push("--threads".to_string());
            args.push(threads.to_string());
        }
        if options.unfiltered {
            args.extend(
                ["-k", "0", "--filter-proteins", "0"]
                    .into_iter()
                    .map(str::to_string),
            );
        }
        args
    }
}

impl<R: CommandRunner> Assembler for PlassAssembler<R> {
    fn assemble(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        scratch: &Path,
        options: &AssemblyOptions,
    ) -> Result<(), KiraError> {
        let args = self.assembly_argv(inputs, output, scratch, options);
        self.runner.run(&args, RunPolicy::strict())?;
        if !output.exists() {
            return Err(KiraError::AssemblyOutputMissing(output.to_path_buf()));
        }
        Ok(())
    }
}
