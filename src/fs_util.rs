use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::error::KiraError;

/// Appends the contents of `source` to `destination`, creating it if needed.
pub fn append_file(source: &Path, destination: &Path) -> Result<u64, KiraError> {
    let mut input = BufReader::new(File::open(source).map_err(|err| fs_error(source, err))?);
    let output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(destination)
        .map_err(|err| fs_error(destination, err))?;
    let mut output = BufWriter::new(output);
    let copied = io::copy(&mut input, &mut output).map_err(|err| fs_error(destination, err))?;
    output.flush().map_err(|err| fs_error(destination, err))?;
    Ok(copied)
}

/// Compresses `path` to `path.gz` and removes the original.
pub fn gzip_file(path: &Path) -> Result<PathBuf, KiraError> {
    let gz_path = with_suffix(path, ".gz");

    let mut input = BufReader::new(File::open(path).map_err(|err| fs_error(path, err))?);
    let output = File::create(&gz_path).map_err(|err| fs_error(&gz_path, err))?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder).map_err(|err| fs_error(&gz_path, err))?;
    encoder
        .finish()
        .and_then(|mut writer| writer.flush())
        .map_err(|err| fs_error(&gz_path, err))?;
    remove_file(path)?;
    Ok(gz_path)
}

/// Moves a file, falling back to copy + delete across filesystems.
pub fn move_file(source: &Path, destination: &Path) -> Result<(), KiraError> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }
    fs::copy(source, destination).map_err(|err| {
        KiraError::Filesystem(format!(
            "move {} to {}: {err}",
            source.display(),
            destination.display()
        ))
    })?;
    remove_file(source)
}

pub fn remove_file(path: &Path) -> Result<(), KiraError> {
    fs::remove_file(path).map_err(|err| fs_error(path, err))
}

/// Removes every file under `root` with extension `ext`; returns how many.
pub fn remove_exts(root: &Path, ext: &str) -> Result<usize, KiraError> {
    let files = find_exts(root, ext);
    for file in &files {
        remove_file(file)?;
    }
    Ok(files.len())
}

pub fn find_exts(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        if let Ok(entries) = fs::read_dir(&path) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path
                    .extension()
                    .and_then(|value| value.to_str())
                    .map(|value| value.eq_ignore_ascii_case(ext))
                    .unwrap_or(false)
                {
                    out.push(path);
                }
            }
        }
    }
    out
}

/// `path` with `suffix` appended to its final component.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn fs_error(path: &Path, err: io::Error) -> KiraError {
    KiraError::Filesystem(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    #[test]
    fn gzip_replaces_original() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("reads.fastq");
        fs::write(&path, b"@r\nA\n+\nI\n").unwrap();

        let gz = gzip_file(&path).unwrap();
        assert_eq!(gz, temp.path().join("reads.fastq.gz"));
        assert!(!path.exists());

        let mut text = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "@r\nA\n+\nI\n");
    }

    #[test]
    fn append_accumulates() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let total = temp.path().join("total");
        fs::write(&a, b"first\n").unwrap();
        fs::write(&b, b"second\n").unwrap();
        append_file(&a, &total).unwrap();
        append_file(&b, &total).unwrap();
        assert_eq!(fs::read_to_string(&total).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn remove_exts_walks_subdirectories() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("sra_cache").join("sra");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("SRR1.sra"), b"x").unwrap();
        fs::write(temp.path().join("keep.fastq"), b"x").unwrap();

        assert_eq!(remove_exts(temp.path(), "sra").unwrap(), 1);
        assert!(temp.path().join("keep.fastq").exists());
    }
}
