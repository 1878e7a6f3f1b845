use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

fn smelt() -> Command {
    Command::cargo_bin("smelt").unwrap()
}

#[test]
fn assembles_a_fasta_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.fa");
    fs::write(&reads, ">r1\nAACCAGAT\n>r2\nAACCAGAT\n").unwrap();
    let out = dir.path().join("contigs.fa");
    let report = dir.path().join("report.json");

    smelt()
        .args(["assemble", "-i"])
        .arg(&reads)
        .args(["-k", "3", "-t", "1", "-o"])
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let contigs = fs::read_to_string(&out).unwrap();
    assert!(contigs.starts_with('>'), "no FASTA header in {contigs:?}");
    // header carries id, length and coverage
    let header = contigs.lines().next().unwrap();
    assert_eq!(header.split_whitespace().count(), 3);

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["k"], 3);
    assert_eq!(json["contigs"], 1);
}

#[test]
fn reads_fastq_input() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.fq");
    fs::write(&reads, "@r1\nAACCAGAT\n+\nIIIIIIII\n").unwrap();
    let out = dir.path().join("contigs.fa");

    smelt()
        .args(["assemble", "-i"])
        .arg(&reads)
        .args(["-k", "3", "-t", "1", "-o"])
        .arg(&out)
        .assert()
        .success();

    assert!(fs::read_to_string(&out).unwrap().starts_with('>'));
}

#[test]
fn empty_input_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.fa");
    fs::write(&reads, "").unwrap();
    let out = dir.path().join("contigs.fa");

    smelt()
        .args(["assemble", "-i"])
        .arg(&reads)
        .args(["-k", "3", "-t", "1", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no usable sequence"));
}

#[test]
fn rejects_bad_k() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.fa");
    fs::write(&reads, ">r1\nAACCAGAT\n").unwrap();
    let out = dir.path().join("contigs.fa");

    smelt()
        .args(["assemble", "-i"])
        .arg(&reads)
        .args(["-k", "2", "-t", "1", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("klen"));
}

#[test]
fn rejects_zero_threads() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.fa");
    fs::write(&reads, ">r1\nAACCAGAT\n").unwrap();
    let out = dir.path().join("contigs.fa");

    smelt()
        .args(["assemble", "-i"])
        .arg(&reads)
        .args(["-k", "3", "-t", "0", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("greater than 0"));
}

#[test]
fn rejects_unknown_input_extension() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.bam");
    fs::write(&reads, "not really a bam").unwrap();
    let out = dir.path().join("contigs.fa");

    smelt()
        .args(["assemble", "-i"])
        .arg(&reads)
        .args(["-k", "3", "-t", "1", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("extension"));
}

#[test]
fn sweep_runs_a_k_ladder() {
    let dir = tempfile::tempdir().unwrap();
    let reads = dir.path().join("reads.fa");
    fs::write(&reads, ">r1\nAACCAGATTT\n>r2\nAACCAGATTT\n").unwrap();
    let out = dir.path().join("contigs.fa");
    let report = dir.path().join("report.json");

    smelt()
        .args(["sweep", "-i"])
        .arg(&reads)
        .args(["-k", "3,5", "-t", "1", "-o"])
        .arg(&out)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    assert!(fs::read_to_string(&out).unwrap().starts_with('>'));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
}
