//! The CCL parser CLI.
//!
//! `cclc` runs the processing passes described by one or more
//! loop-configuration files: each pass reads a corpus, optionally filters
//! its utterances, and learns and/or parses them with a lexicon that
//! persists across passes.
//!
//! Options:
//! - `-G` - configuration files (`NAME VALUE` lines)
//! - `-o` / `-s` - output file base and per-pass suffix
//! - `-B` / `-L` / `-c` - first/last utterance and content-unit bound
//! - `-t` / `-n` / `-C` - top-tag and non-triviality filters
//! - `-e` - evaluators to run on parsing passes
//! - `-p` - dump the lexicon when all passes are done

mod filter;
mod process;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::exit;

use clap::Parser;

use ccl_common::{Config, Trace};
use ccl_corpus::{plain, Action, InputType, LoopConf, LoopEntry};

use filter::Filter;
use process::Session;

#[derive(Parser)]
#[command(name = "cclc", version, about = "Unsupervised incremental CCL parser")]
struct Cli {
    /// Loop configuration files (columns: pattern type action [overrides])
    #[arg(required = true)]
    loop_confs: Vec<PathBuf>,

    /// Configuration files with NAME VALUE lines
    #[arg(short = 'G', long = "config")]
    configs: Vec<PathBuf>,

    /// Output file base; stdout when absent
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Suffix appended to the output name per pass
    #[arg(short = 's', long = "suffix")]
    suffix: Option<String>,

    /// Print progress every N utterances
    #[arg(short = 'R', long = "progress", default_value_t = 0)]
    progress: u32,

    /// First utterance to process (1-based, 0 = from the start)
    #[arg(short = 'B', long = "first", default_value_t = 0)]
    first: u32,

    /// Last utterance to process (0 = to the end)
    #[arg(short = 'L', long = "last", default_value_t = 0)]
    last: u32,

    /// Skip utterances with more content units than this (0 = unbounded)
    #[arg(short = 'c', long = "max-units", default_value_t = 0)]
    max_units: u32,

    /// Process only utterances whose top tag is one of these
    #[arg(short = 't', long = "tag")]
    tags: Vec<String>,

    /// Skip utterances whose top tag is one of these
    #[arg(short = 'n', long = "not-tag")]
    not_tags: Vec<String>,

    /// Process only non-trivial utterances
    #[arg(short = 'C', long = "non-trivial")]
    non_trivial: bool,

    /// Evaluators to run on parsing passes (available: precision)
    #[arg(short = 'e', long = "evaluator")]
    evaluators: Vec<String>,

    /// Dump the lexicon when all passes are done
    #[arg(short = 'p', long = "print-lexicon")]
    print_lexicon: bool,

    /// Emit parsed trees as JSON lines instead of bracket strings
    #[arg(long = "json-trees")]
    json_trees: bool,
}

/// Per-pass overrides, written after the three fixed columns of a loop
/// entry in the same flag syntax.
#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true)]
struct Overrides {
    #[arg(short = 'G')]
    configs: Vec<PathBuf>,
    #[arg(short = 'B')]
    first: Option<u32>,
    #[arg(short = 'L')]
    last: Option<u32>,
    #[arg(short = 'c')]
    max_units: Option<u32>,
    #[arg(short = 's')]
    suffix: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(message) = run(&cli) {
        eprintln!("error: {message}");
        exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    for name in &cli.evaluators {
        if name != "precision" {
            return Err(format!("unknown evaluator: {name}"));
        }
    }

    let mut config = Config::default();
    for path in &cli.configs {
        apply_config_file(&mut config, path)?;
    }

    let trace = if config.trace_bits == ccl_common::TraceBits::empty() {
        Trace::disabled()
    } else {
        Trace::new(config.trace_bits, Box::new(std::io::stderr()))
    };

    let mut session = Session::new(config.clone(), trace);
    session.json_trees = cli.json_trees;

    let mut entries: Vec<LoopEntry> = Vec::new();
    for path in &cli.loop_confs {
        let content = read_file(path)?;
        match LoopConf::parse(&content) {
            Ok(conf) => entries.extend(conf.entries),
            Err(err) => {
                report_line_error(path, &content, err.line, &err.to_string());
                return Err(format!("cannot read execution sequence from {}", path.display()));
            }
        }
    }

    for entry in &entries {
        run_entry(cli, &config, &mut session, entry)?;
    }

    if cli.print_lexicon {
        let mut out = open_output(cli, ".lex")?;
        session.dump_lexicon(&mut out)?;
    }
    Ok(())
}

fn run_entry(
    cli: &Cli,
    global_config: &Config,
    session: &mut Session,
    entry: &LoopEntry,
) -> Result<(), String> {
    let overrides = Overrides::try_parse_from(&entry.overrides)
        .map_err(|e| format!("bad overrides in '{}': {e}", entry.entry_string))?;

    let mut config = global_config.clone();
    for path in &overrides.configs {
        apply_config_file(&mut config, path)?;
    }
    session.set_config(config.clone());

    let filter = Filter {
        max_units: overrides.max_units.unwrap_or(cli.max_units),
        top_tags: cli.tags.clone(),
        exclude_tags: cli.not_tags.clone(),
        non_trivial: cli.non_trivial,
    };

    if entry.action.parses() && cli.evaluators.iter().any(|e| e == "precision") {
        session.enable_evaluation();
    }
    if entry.action == Action::Filter && filter.is_trivial() {
        eprintln!("  note: filter pass with no active predicates; everything matches");
    }

    // collect the utterances of every file the pattern names
    let files = expand_pattern(&entry.pattern)?;
    if files.is_empty() {
        return Err(format!("no input files match '{}'", entry.pattern));
    }
    let mut utterances = Vec::new();
    for file in &files {
        let content = read_file(file)?;
        let mut read = match entry.input_type {
            InputType::Word => plain::read_word_per_line(&content, &config),
            InputType::Line => plain::read_utterance_per_line(&content, &config),
            penn_type => {
                let corpus = penn_type.penn_corpus().expect("penn input type");
                match ccl_corpus::penn::read_penn(&content, corpus, &config) {
                    Ok(read) => read,
                    Err(err) => {
                        report_line_error(file, &content, err.line, &err.to_string());
                        return Err(format!("cannot read corpus {}", file.display()));
                    }
                }
            }
        };
        utterances.append(&mut read);
    }

    let suffix = overrides
        .suffix
        .or_else(|| cli.suffix.clone())
        .unwrap_or_default();
    let mut out = open_output(cli, &suffix)?;

    eprintln!("{}: {} utterances", entry.entry_string, utterances.len());
    let started = std::time::Instant::now();
    let stats = session.run_pass(
        &utterances,
        entry.action,
        &filter,
        overrides.first.unwrap_or(cli.first),
        overrides.last.unwrap_or(cli.last),
        cli.progress,
        &mut out,
    )?;
    if config.printing_mode.obj_count {
        eprintln!("  processed {} of {}", stats.processed, stats.read);
    }
    if config.printing_mode.timing {
        eprintln!("  pass took {:.2?}", started.elapsed());
    }

    if entry.action.parses() {
        if let Some(eval) = &session.evaluator {
            writeln!(out, "# {eval}").map_err(|e| format!("cannot write output: {e}"))?;
        }
    }
    Ok(())
}

fn apply_config_file(config: &mut Config, path: &Path) -> Result<(), String> {
    let content = read_file(path)?;
    if let Err(err) = config.update_from_str(&content) {
        report_span_error(path, &content, err.span, &err.to_string());
        return Err(format!("bad configuration in {}", path.display()));
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read '{}': {e}", path.display()))
}

fn open_output(cli: &Cli, suffix: &str) -> Result<Box<dyn Write>, String> {
    match &cli.output {
        None => Ok(Box::new(std::io::stdout())),
        Some(base) => {
            let mut name = base.as_os_str().to_os_string();
            name.push(suffix);
            let file = fs::File::create(&name)
                .map_err(|e| format!("cannot open output '{}': {e}", base.display()))?;
            Ok(Box::new(file))
        }
    }
}

/// Expand a file pattern. A single `*` in the file name component matches
/// any run of characters; without one, the pattern is a literal path.
fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>, String> {
    let path = Path::new(pattern);
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(vec![path.to_path_buf()]);
    };
    let Some(star) = name.find('*') else {
        return Ok(vec![path.to_path_buf()]);
    };

    let (prefix, rest) = name.split_at(star);
    let suffix = &rest[1..];
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let entries =
        fs::read_dir(&dir).map_err(|e| format!("cannot list '{}': {e}", dir.display()))?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| {
                    n.len() >= prefix.len() + suffix.len()
                        && n.starts_with(prefix)
                        && n.ends_with(suffix)
                })
        })
        .collect();
    matches.sort();
    Ok(matches)
}

/// Render a span-anchored error in a configuration file.
fn report_span_error(path: &Path, content: &str, span: (usize, usize), message: &str) {
    use ariadne::{Label, Report, ReportKind, Source};
    let (start, end) = span;
    let end = end.max(start + 1);
    let _ = Report::<std::ops::Range<usize>>::build(ReportKind::Error, start..end)
        .with_message(format!("{}: configuration error", path.display()))
        .with_label(Label::new(start..end).with_message(message))
        .finish()
        .eprint(Source::from(content));
}

/// Render a line-anchored error in a loop configuration or corpus file.
fn report_line_error(path: &Path, content: &str, line: Option<usize>, message: &str) {
    use ariadne::{Label, Report, ReportKind, Source};
    let (start, end) = match line {
        Some(line_no) => line_span(content, line_no),
        None => (0, 1),
    };
    let _ = Report::<std::ops::Range<usize>>::build(ReportKind::Error, start..end)
        .with_message(format!("{}: input error", path.display()))
        .with_label(Label::new(start..end).with_message(message))
        .finish()
        .eprint(Source::from(content));
}

/// Byte span of a 1-based line.
fn line_span(content: &str, line_no: usize) -> (usize, usize) {
    let mut offset = 0;
    for (idx, line) in content.split_inclusive('\n').enumerate() {
        if idx + 1 == line_no {
            let text = line.trim_end_matches(['\n', '\r']);
            return (offset, offset + text.len().max(1));
        }
        offset += line.len();
    }
    (0, content.len().max(1))
}
