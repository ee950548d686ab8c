use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_plass_runner::error::KiraError;
use kira_plass_runner::fastq::{count_records, deinterleave, interleave};

fn records(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("@{prefix}.{i}/1\nACGTACGT{i}\n+\nIIIIIIII{i}\n"))
        .collect()
}

fn write(path: &Path, text: &str) {
    fs::write(path, text).unwrap();
}

#[test]
fn interleave_then_deinterleave_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    let fwd = temp.path().join("r_1.fastq");
    let rev = temp.path().join("r_2.fastq");
    let fwd_text = records("fwd", 7);
    let rev_text = records("rev", 7);
    write(&fwd, &fwd_text);
    write(&rev, &rev_text);

    let joined = temp.path().join("joined.fastq");
    assert_eq!(interleave(&fwd, &rev, &joined).unwrap(), 7);

    let fwd_out = temp.path().join("out_1.fastq");
    let rev_out = temp.path().join("out_2.fastq");
    let stats = deinterleave(&joined, &fwd_out, &rev_out).unwrap();
    assert_eq!(stats.forward, 7);
    assert_eq!(stats.reverse, 7);

    assert_eq!(fs::read_to_string(&fwd_out).unwrap(), fwd_text);
    assert_eq!(fs::read_to_string(&rev_out).unwrap(), rev_text);
}

#[test]
fn interleaved_output_alternates_mates() {
    let temp = tempfile::tempdir().unwrap();
    let fwd = temp.path().join("a.fq");
    let rev = temp.path().join("b.fq");
    write(&fwd, "@f0\nA\n+\nI\n@f1\nC\n+\nI\n");
    write(&rev, "@r0\nG\n+\nI\n@r1\nT\n+\nI\n");

    let joined = temp.path().join("ab.fq");
    interleave(&fwd, &rev, &joined).unwrap();
    let ids = fs::read_to_string(&joined)
        .unwrap()
        .lines()
        .step_by(4)
        .map(str::to_string)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["@f0", "@r0", "@f1", "@r1"]);
    assert_eq!(count_records(&joined).unwrap(), 4);
}

#[test]
fn unequal_record_counts_are_unbalanced() {
    let temp = tempfile::tempdir().unwrap();
    let fwd = temp.path().join("r_1.fastq");
    let rev = temp.path().join("r_2.fastq");
    write(&fwd, &records("fwd", 3));
    write(&rev, &records("rev", 2));

    let err = interleave(&fwd, &rev, &temp.path().join("joined.fastq")).unwrap_err();
    assert_matches!(err, KiraError::UnbalancedPair { pairs: 2, .. });

    write(&fwd, &records("fwd", 1));
    write(&rev, &records("rev", 4));
    let err = interleave(&fwd, &rev, &temp.path().join("joined.fastq")).unwrap_err();
    assert_matches!(err, KiraError::UnbalancedPair { pairs: 1, .. });
}

#[test]
fn misaligned_separator_is_malformed() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("interleaved.fastq");
    // One sequence line too many shifts every later record boundary.
    write(&input, "@r0\nACGT\n+\nIIII\n@r1\nACGT\nACGT\n+\nIIII\n");

    let err = deinterleave(
        &input,
        &temp.path().join("r_1.fastq"),
        &temp.path().join("r_2.fastq"),
    )
    .unwrap_err();
    assert_matches!(err, KiraError::MalformedRecord { record: 2, .. });
}

#[test]
fn gzipped_interleaved_input_splits_evenly() {
    let temp = tempfile::tempdir().unwrap();
    let input = temp.path().join("sample.fastq.gz");
    let mut encoder = GzEncoder::new(File::create(&input).unwrap(), Compression::default());
    encoder.write_all(records("pair", 10).as_bytes()).unwrap();
    encoder.finish().unwrap();

    let fwd = temp.path().join("sample_1.fastq");
    let rev = temp.path().join("sample_2.fastq");
    deinterleave(&input, &fwd, &rev).unwrap();
    assert_eq!(count_records(&fwd).unwrap(), 5);
    assert_eq!(count_records(&rev).unwrap(), 5);

    let first_reverse = fs::read_to_string(&rev).unwrap();
    assert!(first_reverse.starts_with("@pair.1/1\n"));
}

#[test]
fn gz_suffix_compresses_output() {
    let temp = tempfile::tempdir().unwrap();
    let fwd = temp.path().join("r_1.fastq");
    let rev = temp.path().join("r_2.fastq");
    write(&fwd, &records("fwd", 2));
    write(&rev, &records("rev", 2));

    let joined = temp.path().join("joined.fastq.gz");
    interleave(&fwd, &rev, &joined).unwrap();
    let raw = fs::read(&joined).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    assert_eq!(count_records(&joined).unwrap(), 4);
}
