//! Streaming FASTQ record pairing.
//!
//! Records are kept as their four raw lines so that interleaving and
//! deinterleaving are byte-exact. Nothing here looks at sequence or
//! quality content; only the `@` and `+` sentinels are checked.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use tracing::{info, warn};

use crate::error::KiraError;

pub const IDENTIFIER_SENTINEL: u8 = b'@';
pub const SEPARATOR_SENTINEL: u8 = b'+';

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// One 4-line FASTQ record, each line stored with its trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastqRecord {
    lines: [Vec<u8>; 4],
}

impl FastqRecord {
    pub fn identifier(&self) -> &[u8] {
        trim_newline(&self.lines[0])
    }

    pub fn sequence(&self) -> &[u8] {
        trim_newline(&self.lines[1])
    }

    pub fn quality(&self) -> &[u8] {
        trim_newline(&self.lines[3])
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for line in &self.lines {
            writer.write_all(line)?;
        }
        Ok(())
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Reads validated 4-line records from a plain or gzip stream.
pub struct RecordReader<R> {
    inner: R,
    path: PathBuf,
    records: u64,
}

impl RecordReader<Box<dyn BufRead>> {
    /// Opens `path`, transparently decompressing gzip input.
    pub fn open(path: &Path) -> Result<Self, KiraError> {
        let file = File::open(path).map_err(|err| {
            KiraError::Filesystem(format!("open FASTQ {}: {err}", path.display()))
        })?;
        let mut buffered = BufReader::new(file);
        let head = buffered.fill_buf().map_err(|err| io_error(path, err))?;
        let inner: Box<dyn BufRead> = if head.starts_with(&GZIP_MAGIC) {
            Box::new(BufReader::new(MultiGzDecoder::new(buffered)))
        } else {
            Box::new(buffered)
        };
        Ok(Self::new(inner, path))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(inner: R, path: &Path) -> Self {
        Self {
            inner,
            path: path.to_path_buf(),
            records: 0,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Fills `record` with the next record. Returns `false` at a clean end
    /// of input; a partial trailing record is malformed.
    pub fn read_record(&mut self, record: &mut FastqRecord) -> Result<bool, KiraError> {
        for (index, line) in record.lines.iter_mut().enumerate() {
            line.clear();
            let read = self
                .inner
                .read_until(b'\n', line)
                .map_err(|err| io_error(&self.path, err))?;
            if read == 0 {
                if index == 0 {
                    return Ok(false);
                }
                return Err(self.malformed(format!("truncated record, missing line {}", index + 1)));
            }
            if index == 0 && is_blank(line) {
                return self.skip_blank_tail(line);
            }
            if !line.ends_with(b"\n") {
                line.push(b'\n');
            }
        }
        if record.lines[0].first() != Some(&IDENTIFIER_SENTINEL) {
            return Err(self.malformed("identifier line does not start with '@'".to_string()));
        }
        if record.lines[2].first() != Some(&SEPARATOR_SENTINEL) {
            return Err(self.malformed("separator line does not start with '+'".to_string()));
        }
        self.records += 1;
        Ok(true)
    }

    /// Blank lines are only allowed after the last record.
    fn skip_blank_tail(&mut self, line: &mut Vec<u8>) -> Result<bool, KiraError> {
        loop {
            line.clear();
            let read = self
                .inner
                .read_until(b'\n', line)
                .map_err(|err| io_error(&self.path, err))?;
            if read == 0 {
                return Ok(false);
            }
            if !is_blank(line) {
                return Err(self.malformed("blank line between records".to_string()));
            }
        }
    }

    fn malformed(&self, reason: String) -> KiraError {
        KiraError::MalformedRecord {
            path: self.path.clone(),
            record: self.records + 1,
            reason,
        }
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Output sink, gzip-compressed when the path ends in `.gz`.
pub enum FastqWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FastqWriter {
    pub fn create(path: &Path) -> Result<Self, KiraError> {
        let file = File::create(path).map_err(|err| {
            KiraError::Filesystem(format!("create FASTQ {}: {err}", path.display()))
        })?;
        let buffered = BufWriter::new(file);
        let is_gzip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        Ok(if is_gzip {
            FastqWriter::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            FastqWriter::Plain(buffered)
        })
    }

    pub fn write_record(&mut self, record: &FastqRecord) -> io::Result<()> {
        match self {
            FastqWriter::Plain(writer) => record.write_to(writer),
            FastqWriter::Gzip(writer) => record.write_to(writer),
        }
    }

    pub fn finish(self) -> io::Result<()> {
        match self {
            FastqWriter::Plain(mut writer) => writer.flush(),
            FastqWriter::Gzip(writer) => writer.finish()?.flush(),
        }
    }
}

/// Merges mate files into one interleaved file and returns the pair count.
///
/// Both inputs are read in lockstep; if one runs out before the other the
/// pair is unbalanced.
pub fn interleave(forward: &Path, reverse: &Path, output: &Path) -> Result<u64, KiraError> {
    let mut fwd = RecordReader::open(forward)?;
    let mut rev = RecordReader::open(reverse)?;
    let mut writer = FastqWriter::create(output)?;
    let mut fwd_record = FastqRecord::default();
    let mut rev_record = FastqRecord::default();
    let mut pairs = 0u64;

    loop {
        let has_fwd = fwd.read_record(&mut fwd_record)?;
        let has_rev = rev.read_record(&mut rev_record)?;
        match (has_fwd, has_rev) {
            (true, true) => {
                writer
                    .write_record(&fwd_record)
                    .and_then(|_| writer.write_record(&rev_record))
                    .map_err(|err| io_error(output, err))?;
                pairs += 1;
            }
            (false, false) => break,
            _ => {
                return Err(KiraError::UnbalancedPair {
                    forward: forward.to_path_buf(),
                    reverse: reverse.to_path_buf(),
                    pairs,
                });
            }
        }
    }

    writer.finish().map_err(|err| io_error(output, err))?;
    info!("Interleaved {pairs} pairs of reads");
    Ok(pairs)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeinterleaveStats {
    pub forward: u64,
    pub reverse: u64,
}

/// Splits an interleaved (optionally gzipped) file into mate files:
/// even-indexed records go forward, odd-indexed records go reverse.
pub fn deinterleave(
    input: &Path,
    forward: &Path,
    reverse: &Path,
) -> Result<DeinterleaveStats, KiraError> {
    let mut reader = RecordReader::open(input)?;
    let mut fwd = FastqWriter::create(forward)?;
    let mut rev = FastqWriter::create(reverse)?;
    let mut record = FastqRecord::default();
    let mut stats = DeinterleaveStats::default();

    while reader.read_record(&mut record)? {
        if (reader.records_read() - 1) % 2 == 0 {
            fwd.write_record(&record)
                .map_err(|err| io_error(forward, err))?;
            stats.forward += 1;
        } else {
            rev.write_record(&record)
                .map_err(|err| io_error(reverse, err))?;
            stats.reverse += 1;
        }
    }

    fwd.finish().map_err(|err| io_error(forward, err))?;
    rev.finish().map_err(|err| io_error(reverse, err))?;
    if stats.forward != stats.reverse {
        warn!(
            "{} has an odd number of records; last forward read has no mate",
            input.display()
        );
    }
    info!(
        "Deinterleaved {} forward and {} reverse reads",
        stats.forward, stats.reverse
    );
    Ok(stats)
}

/// Counts validated records in a plain or gzipped FASTQ file.
pub fn count_records(path: &Path) -> Result<u64, KiraError> {
    let mut reader = RecordReader::open(path)?;
    let mut record = FastqRecord::default();
    while reader.read_record(&mut record)? {}
    Ok(reader.records_read())
}

fn io_error(path: &Path, err: io::Error) -> KiraError {
    KiraError::Filesystem(format!("{}: {err}", path.display()))
}
