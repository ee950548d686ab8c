use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{CommandRunner, RunPolicy, argv};
use crate::config::ResolvedConfig;
use crate::domain::SraAccession;
use crate::error::KiraError;
use crate::fastq;
use crate::fs_util;

/// Name of the cumulative read file written by [`fetch_accessions`].
pub const CUMULATIVE_READS: &str = "reads.fastq";

/// SRA Toolkit operations used to turn accessions into FASTQ.
pub trait SraClient {
    /// Points the toolkit's download cache at `cache_dir`. Best effort.
    fn configure_cache(&self, cache_dir: &Path) -> Result<(), KiraError>;

    fn prefetch(&self, accession: &SraAccession, workdir: &Path) -> Result<(), KiraError>;

    /// Extracts the accession into one (single-end) or two (paired-end,
    /// `_1`/`_2`) FASTQ files inside `out_dir`.
    fn dump_fastq(
        &self,
        accession: &SraAccession,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, KiraError>;

    /// Keeps only reads present in both mate files; returns the paired
    /// subsets in forward, reverse order.
    fn pair_filter(&self, forward: &Path, reverse: &Path) -> Result<(PathBuf, PathBuf), KiraError>;
}

#[derive(Clone)]
pub struct SystemSraClient<R: CommandRunner> {
    runner: R,
    prefetch: String,
    fastq_dump: String,
    fastq_pair: String,
    vdb_config: String,
    retries: u32,
}

impl<R: CommandRunner> SystemSraClient<R> {
    pub fn new(runner: R, config: &ResolvedConfig) -> Self {
        let tools = &config.tools;
        Self {
            runner,
            prefetch: tools.prefetch.clone(),
            fastq_dump: tools.fastq_dump.clone(),
            fastq_pair: tools.fastq_pair.clone(),
            vdb_config: tools.vdb_config.clone(),
            retries: config.command_retries,
        }
    }
}

impl<R: CommandRunner> SraClient for SystemSraClient<R> {
    fn configure_cache(&self, cache_dir: &Path) -> Result<(), KiraError> {
        info!(
            "Setting up fastq-dump cache within {}",
            cache_dir.parent().unwrap_or(cache_dir).display()
        );
        fs::create_dir(cache_dir).map_err(|err| {
            KiraError::Filesystem(format!("create {}: {err}", cache_dir.display()))
        })?;
        let setting = format!(
            "/repository/user/main/public/root={}",
            cache_dir.to_string_lossy()
        );
        let args = argv([self.vdb_config.as_str(), "--root", "-s", setting.as_str()]);
        self.runner.run(&args, RunPolicy::best_effort())?;
        Ok(())
    }

    fn prefetch(&self, accession: &SraAccession, _workdir: &Path) -> Result<(), KiraError> {
        let args = argv([self.prefetch.as_str(), accession.as_str()]);
        self.runner.run(&args, RunPolicy::retrying(self.retries))?;
        Ok(())
    }

    fn dump_fastq(
        &self,
        accession: &SraAccession,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, KiraError> {
        let out = out_dir.to_string_lossy().to_string();
        let args = argv([
            self.fastq_dump.as_str(),
            "--split-files",
            "--defline-seq",
            "@$ac.$si.$sg/$ri",
            "--defline-qual",
            "+",
            "--outdir",
            out.as_str(),
            accession.as_str(),
        ]);
        self.runner.run(&args, RunPolicy::retrying(self.retries))?;

        let r1 = out_dir.join(format!("{accession}_1.fastq"));
        let r2 = out_dir.join(format!("{accession}_2.fastq"));
        let single = out_dir.join(format!("{accession}.fastq"));
        if r1.exists() && r2.exists() {
            Ok(vec![r1, r2])
        } else if r1.exists() {
            Ok(vec![r1])
        } else if single.exists() {
            Ok(vec![single])
        } else {
            Err(KiraError::Filesystem(format!(
                "fastq-dump did not produce FASTQ for {accession}"
            )))
        }
    }

    fn pair_filter(&self, forward: &Path, reverse: &Path) -> Result<(PathBuf, PathBuf), KiraError> {
        let args = argv([
            self.fastq_pair.clone(),
            forward.to_string_lossy().to_string(),
            reverse.to_string_lossy().to_string(),
        ]);
        self.runner.run(&args, RunPolicy::strict())?;

        let forward_paired = fs_util::with_suffix(forward, ".paired.fq");
        let reverse_paired = fs_util::with_suffix(reverse, ".paired.fq");
        for path in [&forward_paired, &reverse_paired] {
            if !path.exists() {
                return Err(KiraError::Filesystem(format!(
                    "fastq_pair did not produce {}",
                    path.display()
                )));
            }
        }
        for single in [
            fs_util::with_suffix(forward, ".single.fq"),
            fs_util::with_suffix(reverse, ".single.fq"),
        ] {
            if single.exists() {
                fs_util::remove_file(&single)?;
            }
        }
        Ok((forward_paired, reverse_paired))
    }
}

/// Downloads every accession in order and concatenates their reads into
/// one gzipped file inside `workdir`.
///
/// Paired-end accessions are pair-filtered and interleaved first. Each
/// intermediate is removed as soon as the next form exists. Any failing
/// accession aborts the whole fetch.
pub fn fetch_accessions<S: SraClient + ?Sized>(
    client: &S,
    accessions: &[SraAccession],
    workdir: &Path,
) -> Result<PathBuf, KiraError> {
    if accessions.is_empty() {
        return Err(KiraError::InvalidLocator("sra:// without accessions".to_string()));
    }
    let joined_list = accessions
        .iter()
        .map(SraAccession::as_str)
        .collect::<Vec<_>>()
        .join(",");
    info!("Downloading {joined_list} from SRA");

    let local_path = workdir.join(CUMULATIVE_READS);
    info!("Local path: {}", local_path.display());
    if local_path.exists() {
        fs_util::remove_file(&local_path)?;
    }

    for accession in accessions {
        let accession_output = fetch_accession(client, accession, workdir)?;

        info!("Removing cached SRA files");
        fs_util::remove_exts(workdir, "sra")?;

        info!("Adding reads from {accession} to the total");
        fs_util::append_file(&accession_output, &local_path)?;
        info!("Removing temporary file {}", accession_output.display());
        fs_util::remove_file(&accession_output)?;
    }

    info!("Compress the FASTQ file");
    let compressed = fs_util::gzip_file(&local_path)?;
    info!("Done fetching {joined_list}");
    Ok(compressed)
}

fn fetch_accession<S: SraClient + ?Sized>(
    client: &S,
    accession: &SraAccession,
    workdir: &Path,
) -> Result<PathBuf, KiraError> {
    info!("Downloading {accession} via fastq-dump");
    let joined = workdir.join(format!("{accession}.all.fastq"));

    client.prefetch(accession, workdir)?;
    let files = client.dump_fastq(accession, workdir)?;
    match files.as_slice() {
        [forward, reverse] => {
            let (forward_paired, reverse_paired) = client.pair_filter(forward, reverse)?;
            info!("Removing raw downloaded FASTQ files");
            fs_util::remove_file(forward)?;
            fs_util::remove_file(reverse)?;

            info!("Interleaving the paired FASTQ files");
            fastq::interleave(&forward_paired, &reverse_paired, &joined)?;
            info!("Removing split and filtered FASTQ files");
            fs_util::remove_file(&forward_paired)?;
            fs_util::remove_file(&reverse_paired)?;
        }
        [single] => {
            info!("Using {} as the output file", single.display());
            fs_util::move_file(single, &joined)?;
        }
        other => {
            return Err(KiraError::Filesystem(format!(
                "expected one or two FASTQ files for {accession}, found {}",
                other.len()
            )));
        }
    }
    Ok(joined)
}
