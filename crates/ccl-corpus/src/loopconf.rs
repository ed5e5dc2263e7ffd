//! Loop configuration.
//!
//! A loop-configuration file describes the processing passes of a run, one
//! per line: the input file pattern, the input format, the action to take,
//! and optional per-loop overrides in command-line syntax that shadow the
//! global flags for that pass only.

use crate::error::CorpusError;
use crate::penn::PennCorpus;

/// The format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    /// One token per line; blank lines end utterances.
    Word,
    /// One utterance per line.
    Line,
    Wsj,
    Negra,
    Ctb,
}

impl InputType {
    fn parse(word: &str) -> Option<InputType> {
        Some(match word {
            "word" => InputType::Word,
            "line" => InputType::Line,
            "wsj" => InputType::Wsj,
            "negra" => InputType::Negra,
            "ctb" => InputType::Ctb,
            _ => return None,
        })
    }

    /// The treebank flavor, for the Penn-style formats.
    pub fn penn_corpus(self) -> Option<PennCorpus> {
        match self {
            InputType::Wsj => Some(PennCorpus::Wsj),
            InputType::Negra => Some(PennCorpus::Negra),
            InputType::Ctb => Some(PennCorpus::Ctb),
            InputType::Word | InputType::Line => None,
        }
    }
}

/// What to do with the utterances of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Print the utterances matching the filter.
    Filter,
    /// Update the lexicon statistics.
    Learn,
    /// Parse and emit bracketings.
    Parse,
    /// Learn and parse in the same pass.
    LearnParse,
}

impl Action {
    fn parse(word: &str) -> Option<Action> {
        Some(match word {
            "filter" => Action::Filter,
            "learn" => Action::Learn,
            "parse" => Action::Parse,
            "learn+parse" => Action::LearnParse,
            _ => return None,
        })
    }

    pub fn learns(self) -> bool {
        matches!(self, Action::Learn | Action::LearnParse)
    }

    pub fn parses(self) -> bool {
        matches!(self, Action::Parse | Action::LearnParse)
    }

    pub fn requires_parser(self) -> bool {
        self.learns() || self.parses()
    }
}

/// One line of the loop configuration.
#[derive(Debug, Clone)]
pub struct LoopEntry {
    /// File pattern (glob) naming the input files of this pass.
    pub pattern: String,
    pub input_type: InputType,
    pub action: Action,
    /// Remaining columns: per-loop flag overrides in CLI syntax.
    pub overrides: Vec<String>,
    /// The configuration line, for error messages.
    pub entry_string: String,
}

/// The parsed loop configuration.
#[derive(Debug, Clone, Default)]
pub struct LoopConf {
    pub entries: Vec<LoopEntry>,
}

impl LoopConf {
    /// Parse one configuration file's contents. Lines starting with `#`
    /// and blank lines are skipped.
    pub fn parse(content: &str) -> Result<LoopConf, CorpusError> {
        let mut entries = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut columns = line.split_whitespace();
            let pattern = columns
                .next()
                .ok_or_else(|| CorpusError::bad_loop_entry("missing file pattern", idx + 1))?;
            let type_word = columns
                .next()
                .ok_or_else(|| CorpusError::bad_loop_entry("missing input type", idx + 1))?;
            let input_type = InputType::parse(type_word).ok_or_else(|| {
                CorpusError::bad_loop_entry(format!("unknown input type: {type_word}"), idx + 1)
            })?;
            let action_word = columns
                .next()
                .ok_or_else(|| CorpusError::bad_loop_entry("missing action", idx + 1))?;
            let action = Action::parse(action_word).ok_or_else(|| {
                CorpusError::bad_loop_entry(format!("unknown action: {action_word}"), idx + 1)
            })?;
            entries.push(LoopEntry {
                pattern: pattern.to_string(),
                input_type,
                action,
                overrides: columns.map(str::to_string).collect(),
                entry_string: line.to_string(),
            });
        }
        Ok(LoopConf { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_columns_and_overrides() {
        let conf = LoopConf::parse(
            "# passes\n\
             corpus/*.txt word learn\n\
             corpus/*.txt word learn+parse -B 10 -L 20\n",
        )
        .unwrap();
        assert_eq!(conf.entries.len(), 2);
        assert_eq!(conf.entries[0].input_type, InputType::Word);
        assert_eq!(conf.entries[0].action, Action::Learn);
        assert!(conf.entries[0].overrides.is_empty());
        assert_eq!(conf.entries[1].action, Action::LearnParse);
        assert_eq!(conf.entries[1].overrides, vec!["-B", "10", "-L", "20"]);
    }

    #[test]
    fn actions_know_their_cycles() {
        assert!(Action::Learn.learns() && !Action::Learn.parses());
        assert!(Action::Parse.parses() && !Action::Parse.learns());
        assert!(Action::LearnParse.learns() && Action::LearnParse.parses());
        assert!(!Action::Filter.requires_parser());
    }

    #[test]
    fn unknown_type_is_rejected_with_line() {
        let err = LoopConf::parse("x.txt sgml parse\n").unwrap_err();
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn penn_types_map_to_corpora() {
        assert_eq!(InputType::Wsj.penn_corpus(), Some(PennCorpus::Wsj));
        assert_eq!(InputType::Word.penn_corpus(), None);
    }
}
