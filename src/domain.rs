use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

const OBJECT_STORE_PREFIX: &str = "s3://";
const ARCHIVE_PREFIX: &str = "sra://";
const LOCAL_PREFIXES: [&str; 2] = ["file://", "local-path://"];

/// NCBI translation tables that Plass (through MMseqs2) can translate with.
const GENETIC_CODE_TABLES: [u8; 25] = [
    1, 2, 3, 4, 5, 6, 9, 10, 11, 12, 13, 14, 15, 16, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AssemblyType {
    Paired,
    Unpaired,
}

impl fmt::Display for AssemblyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyType::Paired => write!(f, "paired"),
            AssemblyType::Unpaired => write!(f, "unpaired"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GeneticCode(u8);

impl GeneticCode {
    pub fn table(&self) -> u8 {
        self.0
    }
}

impl Default for GeneticCode {
    fn default() -> Self {
        Self(11)
    }
}

impl fmt::Display for GeneticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GeneticCode {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let table = value
            .trim()
            .parse::<u8>()
            .map_err(|_| KiraError::InvalidGeneticCode(value.to_string()))?;
        if !GENETIC_CODE_TABLES.contains(&table) {
            return Err(KiraError::InvalidGeneticCode(value.to_string()));
        }
        Ok(Self(table))
    }
}

/// Which of the two wrapper flavours is running.
///
/// The legacy flavour knows about SRA and links local inputs into the
/// working directory; the extended flavour copies local inputs and tunes
/// the assembler (translation table, threads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    Legacy,
    Extended,
}

impl PipelineVariant {
    pub fn supports_archive(&self) -> bool {
        matches!(self, PipelineVariant::Legacy)
    }

    pub fn configures_sra_cache(&self) -> bool {
        matches!(self, PipelineVariant::Legacy)
    }

    pub fn links_local_inputs(&self) -> bool {
        matches!(self, PipelineVariant::Legacy)
    }

    pub fn tunes_assembler(&self) -> bool {
        matches!(self, PipelineVariant::Extended)
    }
}

impl fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineVariant::Legacy => write!(f, "legacy"),
            PipelineVariant::Extended => write!(f, "extended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SraAccession(String);

impl SraAccession {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SraAccession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SraAccession {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^[SED]R[RXSP][0-9]+$").expect("accession pattern is valid")
        });
        let normalized = value.trim().to_uppercase();
        if !pattern.is_match(&normalized) {
            return Err(KiraError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

/// `s3://bucket/key` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn uri(&self) -> String {
        format!("{OBJECT_STORE_PREFIX}{}/{}", self.bucket, self.key)
    }

    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(self.key.as_str())
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

impl FromStr for ObjectLocation {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let rest = value
            .strip_prefix(OBJECT_STORE_PREFIX)
            .ok_or_else(|| KiraError::UnrecognizedScheme(value.to_string()))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| KiraError::InvalidLocator(value.to_string()))?;
        if bucket.is_empty() || key.is_empty() || key.ends_with('/') {
            return Err(KiraError::InvalidLocator(value.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProtocol {
    Ftp,
    Http,
    Https,
}

impl RemoteProtocol {
    fn prefix(&self) -> &'static str {
        match self {
            RemoteProtocol::Ftp => "ftp://",
            RemoteProtocol::Http => "http://",
            RemoteProtocol::Https => "https://",
        }
    }
}

/// An FTP or HTTP(S) URL with the host and path kept apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub protocol: RemoteProtocol,
    pub host: String,
    pub path: String,
}

impl RemoteUrl {
    pub fn url(&self) -> String {
        format!("{}{}/{}", self.protocol.prefix(), self.host, self.path)
    }

    pub fn basename(&self) -> &str {
        let path = self.path.split(['?', '#']).next().unwrap_or(self.path.as_str());
        path.rsplit('/').next().unwrap_or(path)
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

impl FromStr for RemoteUrl {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let protocol = [
            RemoteProtocol::Ftp,
            RemoteProtocol::Https,
            RemoteProtocol::Http,
        ]
        .into_iter()
        .find(|protocol| value.starts_with(protocol.prefix()))
        .ok_or_else(|| KiraError::UnrecognizedScheme(value.to_string()))?;
        let rest = &value[protocol.prefix().len()..];
        let (host, path) = rest
            .split_once('/')
            .ok_or_else(|| KiraError::InvalidLocator(value.to_string()))?;
        let url = Self {
            protocol,
            host: host.to_string(),
            path: path.to_string(),
        };
        if host.is_empty() || url.basename().is_empty() {
            return Err(KiraError::InvalidLocator(value.to_string()));
        }
        Ok(url)
    }
}

/// A read source locator, classified by its URI prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceScheme {
    ObjectStore(ObjectLocation),
    Archive { accessions: Vec<SraAccession> },
    Remote(RemoteUrl),
    Local(PathBuf),
}

impl SourceScheme {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceScheme::ObjectStore(_) => "s3",
            SourceScheme::Archive { .. } => "sra",
            SourceScheme::Remote(_) => "url",
            SourceScheme::Local(_) => "local",
        }
    }
}

impl fmt::Display for SourceScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceScheme::ObjectStore(location) => write!(f, "{location}"),
            SourceScheme::Archive { accessions } => {
                let joined = accessions
                    .iter()
                    .map(SraAccession::as_str)
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{ARCHIVE_PREFIX}{joined}")
            }
            SourceScheme::Remote(url) => write!(f, "{url}"),
            SourceScheme::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for SourceScheme {
    type Err = KiraError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(KiraError::InvalidLocator(value.to_string()));
        }
        if trimmed.starts_with(OBJECT_STORE_PREFIX) {
            return Ok(SourceScheme::ObjectStore(trimmed.parse()?));
        }
        if let Some(rest) = trimmed.strip_prefix(ARCHIVE_PREFIX) {
            let accessions = rest
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::parse::<SraAccession>)
                .collect::<Result<Vec<_>, _>>()?;
            if accessions.is_empty() {
                return Err(KiraError::InvalidLocator(value.to_string()));
            }
            return Ok(SourceScheme::Archive { accessions });
        }
        if ["ftp://", "http://", "https://"]
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            return Ok(SourceScheme::Remote(trimmed.parse()?));
        }
        for prefix in LOCAL_PREFIXES {
            if let Some(path) = trimmed.strip_prefix(prefix) {
                if path.is_empty() {
                    return Err(KiraError::InvalidLocator(value.to_string()));
                }
                return Ok(SourceScheme::Local(PathBuf::from(path)));
            }
        }
        if trimmed.contains("://") {
            return Err(KiraError::UnrecognizedScheme(value.to_string()));
        }
        Ok(SourceScheme::Local(PathBuf::from(trimmed)))
    }
}

/// Splits a comma-separated `--input` value into locators.
///
/// Bare accessions following an `sra://` locator extend its accession
/// list, so `sra://SRR1,SRR2` names two runs rather than a run and a
/// local file.
pub fn parse_locator_list(input: &str) -> Result<Vec<SourceScheme>, KiraError> {
    let mut locators: Vec<SourceScheme> = Vec::new();
    for item in input.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        if !item.contains("://") {
            if let Some(SourceScheme::Archive { accessions }) = locators.last_mut() {
                if let Ok(accession) = item.parse::<SraAccession>() {
                    accessions.push(accession);
                    continue;
                }
            }
        }
        locators.push(item.parse()?);
    }
    if locators.is_empty() {
        return Err(KiraError::InvalidLocator(input.to_string()));
    }
    Ok(locators)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_object_location() {
        let location: ObjectLocation = "s3://bucket/reads/sample.fastq.gz".parse().unwrap();
        assert_eq!(location.bucket, "bucket");
        assert_eq!(location.key, "reads/sample.fastq.gz");
        assert_eq!(location.basename(), "sample.fastq.gz");
    }

    #[test]
    fn object_location_requires_key() {
        let err = "s3://bucket".parse::<ObjectLocation>().unwrap_err();
        assert_matches!(err, KiraError::InvalidLocator(_));
    }

    #[test]
    fn remote_basename_drops_query() {
        let url: RemoteUrl = "https://example.org/data/r.fq.gz?token=1".parse().unwrap();
        assert_eq!(url.basename(), "r.fq.gz");
        assert_eq!(url.protocol, RemoteProtocol::Https);
    }

    #[test]
    fn genetic_code_rejects_unknown_tables() {
        assert_eq!("4".parse::<GeneticCode>().unwrap().table(), 4);
        assert_matches!(
            "7".parse::<GeneticCode>(),
            Err(KiraError::InvalidGeneticCode(_))
        );
        assert_eq!("31".parse::<GeneticCode>().unwrap().table(), 31);
        assert_matches!(
            "33".parse::<GeneticCode>(),
            Err(KiraError::InvalidGeneticCode(_))
        );
        assert_matches!(
            "abc".parse::<GeneticCode>(),
            Err(KiraError::InvalidGeneticCode(_))
        );
    }

    #[test]
    fn archive_display_round_trips_accessions() {
        let scheme: SourceScheme = "sra://SRR1,srr2".parse().unwrap();
        assert_eq!(scheme.to_string(), "sra://SRR1,SRR2");
    }
}
