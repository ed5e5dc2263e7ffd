//! End-to-end tests for the cclc driver.
//!
//! Each test writes a corpus and a loop configuration into a temp
//! directory, runs the real binary, and checks its outputs.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn cclc() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cclc"))
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).expect("failed to write test file");
}

fn run(args: &[&str]) -> Output {
    Command::new(cclc())
        .args(args)
        .output()
        .expect("failed to invoke cclc")
}

/// A small word-per-line corpus: each utterance is one token per line,
/// terminated by a blank line.
fn word_corpus(rounds: usize) -> String {
    let mut corpus = String::new();
    for _ in 0..rounds {
        corpus.push_str("the\ndog\nbarks\n.\n\n");
    }
    corpus
}

#[test]
fn learn_then_parse_emits_bracketings() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    write(&corpus, &word_corpus(8));

    let conf = dir.path().join("run.loop");
    write(
        &conf,
        &format!(
            "{corpus} word learn\n{corpus} word learn\n{corpus} word parse\n",
            corpus = corpus.display()
        ),
    );

    let out_base = dir.path().join("out");
    let output = run(&[
        conf.to_str().unwrap(),
        "-o",
        out_base.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "cclc failed:\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed = std::fs::read_to_string(&out_base).expect("output file missing");
    let lines: Vec<&str> = parsed.lines().collect();
    assert_eq!(lines.len(), 8);
    for line in lines {
        assert!(line.starts_with('('), "not a bracketing: {line}");
        assert!(line.contains("the"));
    }
}

#[test]
fn filter_action_prints_matching_utterances() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    write(&corpus, "the\ndog\n\nan\nold\ncat\n\n");

    let conf = dir.path().join("run.loop");
    write(&conf, &format!("{} word filter\n", corpus.display()));

    // only utterances with at most two content units pass
    let out_base = dir.path().join("filtered");
    let output = run(&[
        conf.to_str().unwrap(),
        "-o",
        out_base.to_str().unwrap(),
        "-c",
        "2",
    ]);
    assert!(output.status.success());

    let filtered = std::fs::read_to_string(&out_base).unwrap();
    assert!(filtered.contains("the"));
    assert!(filtered.contains("dog"));
    assert!(!filtered.contains("cat"));
}

#[test]
fn lexicon_dump_lists_words_by_count() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    write(&corpus, &word_corpus(3));

    let conf = dir.path().join("run.loop");
    write(&conf, &format!("{} word learn\n", corpus.display()));

    let out_base = dir.path().join("out");
    let output = run(&[
        conf.to_str().unwrap(),
        "-o",
        out_base.to_str().unwrap(),
        "-p",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let lex_path = dir.path().join("out.lex");
    let dump = std::fs::read_to_string(lex_path).expect("lexicon dump missing");
    assert!(dump.contains("the (3)"));
    assert!(dump.contains("dog (3)"));
    assert!(dump.contains("Learned"));
}

#[test]
fn parse_with_evaluator_reports_scores() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    // utterance-per-line input with punctuation
    write(&corpus, "the dog barks .\nthe dog barks .\n");

    let conf = dir.path().join("run.loop");
    write(
        &conf,
        &format!(
            "{corpus} line learn\n{corpus} line parse\n",
            corpus = corpus.display()
        ),
    );

    let out_base = dir.path().join("out");
    let output = run(&[
        conf.to_str().unwrap(),
        "-o",
        out_base.to_str().unwrap(),
        "-e",
        "precision",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed = std::fs::read_to_string(&out_base).unwrap();
    assert!(parsed.contains("precision"));
    assert!(parsed.contains("recall"));
}

#[test]
fn bad_loop_configuration_fails() {
    let dir = tempfile::tempdir().unwrap();
    let conf = dir.path().join("run.loop");
    write(&conf, "corpus.txt sgml parse\n");

    let output = run(&[conf.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn unknown_config_name_fails_with_report() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.txt");
    write(&corpus, "the\n\n");
    let conf = dir.path().join("run.loop");
    write(&conf, &format!("{} word learn\n", corpus.display()));
    let config = dir.path().join("bad.conf");
    write(&config, "NoSuchOption 1\n");

    let output = run(&[
        conf.to_str().unwrap(),
        "-G",
        config.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
}
