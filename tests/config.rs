use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;

use kira_plass_runner::config::{Config, ConfigLoader, ToolEntries};
use kira_plass_runner::error::KiraError;

#[test]
fn defaults_without_overrides() {
    let resolved = ConfigLoader::resolve_config(Config::default());
    assert_eq!(resolved.schema_version, 1);
    assert_eq!(resolved.tools.fastq_dump, "fastq-dump");
    assert_eq!(resolved.tools.vdb_config, "vdb-config");
    assert_eq!(resolved.http_retries, 3);
}

#[test]
fn explicit_file_is_loaded() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-plass.json");
    let config = Config {
        schema_version: Some(1),
        tools: ToolEntries {
            aws: Some("/usr/local/bin/aws".to_string()),
            ..ToolEntries::default()
        },
        command_retries: Some(2),
        http_timeout_secs: Some(30),
        http_retries: None,
    };
    fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.tools.aws, "/usr/local/bin/aws");
    assert_eq!(resolved.tools.plass, "plass");
    assert_eq!(resolved.command_retries, 2);
    assert_eq!(resolved.http_timeout, Duration::from_secs(30));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, KiraError::ConfigRead(_));
}

#[test]
fn malformed_json_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("bad.json");
    fs::write(&path, "{ not json").unwrap();
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, KiraError::ConfigParse(_));
}
