//! The processing layer between the corpus readers and the parser.
//!
//! Utterances arrive whole (symbols plus gold tree). Each is gated by the
//! filter, fed to the parser symbol by symbol, and, in parsing passes,
//! evaluated against the gold standard and printed.

use std::io::Write;

use ccl_common::{Config, InputSymbol, SynTree, Trace, TraceBits};
use ccl_core::stat::{Prop, PropKind};
use ccl_core::CclParser;
use ccl_corpus::{Action, Utterance};
use ccl_eval::PrecisionAndRecall;

use crate::filter::Filter;

/// Counters of one pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassStats {
    pub read: u32,
    pub processed: u32,
}

/// One processing session: the parser with its lexicon, the evaluator and
/// the output sink. Lives across passes so that the lexicon accumulates.
pub struct Session {
    parser: CclParser,
    pub evaluator: Option<PrecisionAndRecall>,
    /// Emit parsed trees as JSON lines instead of bracket strings.
    pub json_trees: bool,
    config: Config,
    trace: Trace,
}

impl Session {
    pub fn new(config: Config, trace: Trace) -> Session {
        Session {
            parser: CclParser::new(config.clone(), trace.clone()),
            evaluator: None,
            json_trees: false,
            config,
            trace,
        }
    }

    /// Install a fresh configuration (per-pass overrides).
    pub fn set_config(&mut self, config: Config) {
        self.parser.set_config(config.clone());
        self.config = config;
    }

    pub fn enable_evaluation(&mut self) {
        if self.evaluator.is_none() {
            self.evaluator = Some(PrecisionAndRecall::new(self.config.count_top_bracket));
        }
    }

    /// Run one pass over a batch of utterances.
    ///
    /// `first`/`last` bound the utterance numbers processed (1-based;
    /// 0 = unbounded). Output is written to `out`.
    #[allow(clippy::too_many_arguments)]
    pub fn run_pass(
        &mut self,
        utterances: &[Utterance],
        action: Action,
        filter: &Filter,
        first: u32,
        last: u32,
        progress: u32,
        out: &mut dyn Write,
    ) -> Result<PassStats, String> {
        self.parser.set_learn_cycle(action.learns());
        self.parser.set_parse_cycle(action.parses());

        let mut stats = PassStats::default();
        for utterance in utterances {
            stats.read += 1;
            if first > 0 && stats.read < first {
                continue;
            }
            if last > 0 && stats.read > last {
                break;
            }
            if !filter.matches(utterance.gold.as_ref()) {
                if self.trace.on(TraceBits::FILTER) {
                    self.trace.line(
                        TraceBits::FILTER,
                        &format!("rejected utterance {}: {}", stats.read, utterance.source.trim_end()),
                    );
                }
                continue;
            }
            stats.processed += 1;
            if self.trace.on(TraceBits::UTTERANCE) {
                self.trace.line(
                    TraceBits::UTTERANCE,
                    &format!("utterance {}: {}", stats.read, utterance.source.trim_end()),
                );
            }

            match action {
                Action::Filter => {
                    writeln!(out, "{}", utterance.source.trim_end())
                        .map_err(|e| format!("cannot write output: {e}"))?;
                }
                _ => self.process_utterance(utterance, action, out)?,
            }

            if progress > 0 && stats.read % progress == 0 {
                eprintln!("  ...{} utterances", stats.read);
            }
        }
        Ok(stats)
    }

    fn process_utterance(
        &mut self,
        utterance: &Utterance,
        action: Action,
        out: &mut dyn Write,
    ) -> Result<(), String> {
        if action.parses() && self.config.printing_mode.source_text {
            writeln!(out, "# {}", utterance.source.trim_end())
                .map_err(|e| format!("cannot write output: {e}"))?;
        }
        for symbol in &utterance.symbols {
            let fed = match symbol {
                InputSymbol::Unit { name, labels } => self.parser.unit(name, labels),
                InputSymbol::Punct(kind) => self.parser.punct(*kind),
            };
            if let Err(err) = fed {
                // terminate the utterance cleanly: queued learning is
                // dropped, the lexicon stays consistent
                self.parser.abort_utterance();
                return Err(format!("utterance aborted: {err}"));
            }
        }

        if action.parses() {
            let tree = self.parser.syn_tree();
            if self.json_trees {
                write_tree_json(&tree, out)?;
            } else {
                writeln!(out, "{}", tree.bracket_string())
                    .map_err(|e| format!("cannot write output: {e}"))?;
            }
            if let (Some(eval), Some(gold)) = (self.evaluator.as_mut(), utterance.gold.as_ref())
            {
                eval.from_trees(gold, &tree);
                if self.trace.on(TraceBits::EVAL) {
                    let line = format!(
                        "eval: last precision {:.4} recall {:.4}",
                        eval.last_precision(),
                        eval.last_recall()
                    );
                    self.trace.line(TraceBits::EVAL, &line);
                }
            }
        }
        Ok(())
    }

    /// Dump the lexicon: every entry with at least `lex_min_print`
    /// occurrences, most frequent first, with both statistic chains.
    pub fn dump_lexicon(&self, out: &mut dyn Write) -> Result<(), String> {
        let min = self.config.lex_min_print;
        for (word, entry) in self.parser.lexicon().by_descending_count() {
            let entry = entry.borrow();
            if entry.count < min {
                continue;
            }
            writeln!(out, "{word} ({})", entry.count)
                .map_err(|e| format!("cannot write output: {e}"))?;
            for side in ccl_common::Side::both() {
                let side_name = match side {
                    ccl_common::Side::Left => "Left",
                    ccl_common::Side::Right => "Right",
                };
                let mut position = 1;
                let mut current = Some(entry.stats(side));
                while let Some(stats_rc) = current {
                    {
                        let stats = stats_rc.borrow();
                        if stats.is_empty() {
                            break;
                        }
                        let mut line = format!(
                            "  {side_name} {position}: Learned {} Blocked {} In {} Out {} InDerived {}",
                            stats.val(Prop::Learn, PropKind::Base),
                            stats.val(Prop::Block, PropKind::Base),
                            stats.val(Prop::In, PropKind::Base),
                            stats.val(Prop::Out, PropKind::Base),
                            stats.val(Prop::In, PropKind::Derived),
                        );
                        let seen: Vec<String> = stats
                            .seen_top()
                            .map(|(label, strg)| format!("{} {strg}", label.name()))
                            .collect();
                        if !seen.is_empty() {
                            line.push_str(" | Seen: ");
                            line.push_str(&seen.join(", "));
                        }
                        writeln!(out, "{line}")
                            .map_err(|e| format!("cannot write output: {e}"))?;
                    }
                    current = stats_rc.borrow().next_existing();
                    position += 1;
                }
            }
        }
        Ok(())
    }
}

/// Write one parsed tree as a single-line JSON document.
fn write_tree_json(tree: &SynTree, out: &mut dyn Write) -> Result<(), String> {
    let json = serde_json::to_string(tree).map_err(|e| format!("cannot encode tree: {e}"))?;
    writeln!(out, "{json}").map_err(|e| format!("cannot write output: {e}"))
}
