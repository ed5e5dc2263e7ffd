use std::fmt;

use crate::trace::TraceBits;

/// Optional progress / diagnostic printing classes, switched on by the
/// `printing_mode` configuration value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintingMode {
    pub timing: bool,
    pub obj_count: bool,
    pub extra_parse: bool,
    pub more_extra_parse: bool,
    pub source_text: bool,
    pub extra_eval: bool,
    pub config: bool,
}

/// All recognized configuration values, collected into one immutable struct
/// handed to each parse session.
///
/// Values are read from configuration files of `NAME VALUE` lines (string
/// values extend to the end of the line, `#` starts a comment). Later files
/// and later lines override earlier ones.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum length of the per-adjacency `Seen` top list.
    pub statistics_top_list_max_len: u32,
    /// Maximum number of labels per side in a unit's label table.
    pub max_labels: u32,
    /// Replace the surface form of each unit by its tag.
    pub use_tags_as_words: bool,
    /// Add the tag of each unit as an extra label.
    pub use_tags_as_labels: bool,
    /// Treat currency symbols as punctuation.
    pub currency_symbol_is_punct: bool,
    /// Honor stopping punctuation (otherwise it is ignored).
    pub use_stopping_punct: bool,
    /// Backward compatibility: discard terminating punctuation marks.
    pub discard_terminating_punct: bool,
    /// Read Penn-Treebank objects right to left.
    pub reverse_penn_objs: bool,
    /// Allow the scorer to fall back to the base `In` value when the
    /// derived `In` value is non-positive.
    pub ccl_basic_use_both_in_values: bool,
    /// Include the top bracket when computing precision and recall.
    pub count_top_bracket: bool,
    /// Input lines starting with this string are skipped.
    pub comment_str: String,
    /// Minimum occurrence count for a lexicon entry to be printed.
    pub lex_min_print: u32,
    /// Progress / diagnostic printing classes.
    pub printing_mode: PrintingMode,
    /// Trace bit-mask (see [`TraceBits`]).
    pub trace_bits: TraceBits,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            statistics_top_list_max_len: 10,
            max_labels: 10,
            use_tags_as_words: false,
            use_tags_as_labels: false,
            currency_symbol_is_punct: false,
            use_stopping_punct: true,
            discard_terminating_punct: false,
            reverse_penn_objs: false,
            ccl_basic_use_both_in_values: true,
            count_top_bracket: false,
            comment_str: "#".to_string(),
            lex_min_print: 1,
            printing_mode: PrintingMode::default(),
            trace_bits: TraceBits::empty(),
        }
    }
}

/// A configuration-file error, with the byte span of the offending text.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub span: (usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErrorKind {
    UnknownName(String),
    BadValue { name: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConfigErrorKind::UnknownName(name) => {
                write!(f, "unknown configuration name: {name}")
            }
            ConfigErrorKind::BadValue { name, value } => {
                write!(f, "bad value for {name}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Update this configuration from the contents of one configuration file.
    ///
    /// Lines are `NAME VALUE`; everything after the name is the value for
    /// string-valued names. Comment lines start with `#`, blank lines are
    /// skipped. Returns the first error encountered with its byte span.
    pub fn update_from_str(&mut self, content: &str) -> Result<(), ConfigError> {
        let mut offset = 0usize;
        for line in content.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            let text = line.trim_end_matches(['\n', '\r']);
            let trimmed = text.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let name_off = line_start + (text.len() - trimmed.len());
            let (name, rest) = match trimmed.split_once(char::is_whitespace) {
                Some((n, r)) => (n, r.trim()),
                None => (trimmed, ""),
            };
            let span = (name_off, name_off + trimmed.len());

            self.set(name, rest).map_err(|kind| ConfigError { kind, span })?;
        }
        Ok(())
    }

    /// Set a single named value.
    fn set(&mut self, name: &str, value: &str) -> Result<(), ConfigErrorKind> {
        let num = |v: &str| -> Result<u32, ConfigErrorKind> {
            v.parse().map_err(|_| ConfigErrorKind::BadValue {
                name: name.to_string(),
                value: v.to_string(),
            })
        };
        let flag = |v: &str| -> Result<bool, ConfigErrorKind> { Ok(num(v)? != 0) };

        match name {
            "StatisticsTopListMaxLen" => self.statistics_top_list_max_len = num(value)?,
            "MaxLabels" => self.max_labels = num(value)?,
            "UseTagsAsWords" => self.use_tags_as_words = flag(value)?,
            "UseTagsAsLabels" => self.use_tags_as_labels = flag(value)?,
            "CurrencySymbolIsPunct" => self.currency_symbol_is_punct = flag(value)?,
            "UseStoppingPunct" => self.use_stopping_punct = flag(value)?,
            "DiscardTerminatingPunct" => self.discard_terminating_punct = flag(value)?,
            "ReversePennObjs" => self.reverse_penn_objs = flag(value)?,
            "CCLBasicUseBothInValues" => self.ccl_basic_use_both_in_values = flag(value)?,
            "CountTopBracket" => self.count_top_bracket = flag(value)?,
            "CommentStr" => self.comment_str = value.to_string(),
            "LexMinPrint" => self.lex_min_print = num(value)?,
            "PrintingMode" => self.printing_mode = parse_printing_mode(name, value)?,
            "TraceBits" => self.trace_bits = TraceBits::from_bits(num(value)?),
            _ => return Err(ConfigErrorKind::UnknownName(name.to_string())),
        }
        Ok(())
    }
}

fn parse_printing_mode(name: &str, value: &str) -> Result<PrintingMode, ConfigErrorKind> {
    let mut mode = PrintingMode::default();
    for word in value.split_whitespace() {
        match word {
            "timing" => mode.timing = true,
            "obj_count" => mode.obj_count = true,
            "extra_parse" => mode.extra_parse = true,
            "more_extra_parse" => mode.more_extra_parse = true,
            "source_text" => mode.source_text = true,
            "extra_eval" => mode.extra_eval = true,
            "config" => mode.config = true,
            other => {
                return Err(ConfigErrorKind::BadValue {
                    name: name.to_string(),
                    value: other.to_string(),
                })
            }
        }
    }
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.statistics_top_list_max_len, 10);
        assert!(config.use_stopping_punct);
        assert!(!config.use_tags_as_words);
    }

    #[test]
    fn update_from_file_text() {
        let mut config = Config::default();
        config
            .update_from_str(
                "# a comment\n\
                 StatisticsTopListMaxLen 25\n\
                 UseTagsAsWords 1\n\
                 CommentStr ;; anything goes\n",
            )
            .unwrap();
        assert_eq!(config.statistics_top_list_max_len, 25);
        assert!(config.use_tags_as_words);
        assert_eq!(config.comment_str, ";; anything goes");
    }

    #[test]
    fn unknown_name_reports_span() {
        let mut config = Config::default();
        let err = config.update_from_str("NoSuchOption 1\n").unwrap_err();
        assert!(matches!(err.kind, ConfigErrorKind::UnknownName(_)));
        assert_eq!(err.span.0, 0);
    }

    #[test]
    fn bad_numeric_value() {
        let mut config = Config::default();
        let err = config.update_from_str("MaxLabels many\n").unwrap_err();
        assert!(matches!(err.kind, ConfigErrorKind::BadValue { .. }));
    }

    #[test]
    fn printing_mode_words() {
        let mut config = Config::default();
        config
            .update_from_str("PrintingMode timing extra_parse\n")
            .unwrap();
        assert!(config.printing_mode.timing);
        assert!(config.printing_mode.extra_parse);
        assert!(!config.printing_mode.config);
    }
}
