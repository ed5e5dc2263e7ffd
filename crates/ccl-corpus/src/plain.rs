//! Plain-text corpus readers.
//!
//! Two layouts are supported: one token per line (a blank line ends the
//! utterance) and one whitespace-tokenized utterance per line. Both detect
//! punctuation by surface form and build a flat gold tree (all terminals
//! under one node) so that filters and evaluators have something to work
//! with.

use ccl_common::{Config, InputSymbol, PunctKind, SynTree};

use crate::Utterance;

/// The punctuation class of a surface token, if it is one. Penn-Treebank
/// escape forms (`-LRB-` etc.) are recognized as well. Currency marks
/// count only when the configuration says so.
pub fn punct_of(token: &str, config: &Config) -> Option<PunctKind> {
    let kind = match token {
        "." => PunctKind::FullStop,
        "?" => PunctKind::Question,
        "!" => PunctKind::Exclamation,
        ";" => PunctKind::SemiColon,
        "--" => PunctKind::Dash,
        ":" => PunctKind::Colon,
        "," => PunctKind::Comma,
        "..." => PunctKind::Ellipsis,
        "(" | "-LRB-" | "-LCB-" => PunctKind::LeftParen,
        ")" | "-RRB-" | "-RCB-" => PunctKind::RightParen,
        "``" => PunctKind::LeftDoubleQuote,
        "''" => PunctKind::RightDoubleQuote,
        "`" => PunctKind::LeftSingleQuote,
        "'" => PunctKind::RightSingleQuote,
        "-" => PunctKind::Hyphen,
        "$" | "#" => PunctKind::Currency,
        _ => return None,
    };
    if kind == PunctKind::Currency && !config.currency_symbol_is_punct {
        return None;
    }
    Some(kind)
}

/// Accumulates the terminals of one utterance.
struct Builder {
    symbols: Vec<InputSymbol>,
    tree: SynTree,
    terminals: Vec<ccl_common::NodeId>,
    source: String,
}

impl Builder {
    fn new() -> Builder {
        Builder {
            symbols: Vec::new(),
            tree: SynTree::new(),
            terminals: Vec::new(),
            source: String::new(),
        }
    }

    fn token(&mut self, token: &str, config: &Config) {
        match punct_of(token, config) {
            Some(kind) => {
                self.terminals
                    .push(self.tree.add_terminal(token, "", true, false));
                if !(config.discard_terminating_punct && kind.is_terminating()) {
                    self.symbols.push(InputSymbol::Punct(kind));
                }
            }
            None => {
                self.terminals
                    .push(self.tree.add_terminal(token, "", false, false));
                self.symbols.push(InputSymbol::unit(token));
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    fn finish(mut self) -> Utterance {
        self.tree.add_non_terminal("", self.terminals);
        self.symbols.push(InputSymbol::Punct(PunctKind::EoUtterance));
        Utterance {
            symbols: self.symbols,
            gold: Some(self.tree),
            source: self.source,
        }
    }
}

/// Read a corpus with one token per line. Blank lines separate utterances;
/// comment lines are skipped.
pub fn read_word_per_line(content: &str, config: &Config) -> Vec<Utterance> {
    let mut utterances = Vec::new();
    let mut builder = Builder::new();

    for line in content.lines() {
        if is_comment(line, config) {
            continue;
        }
        let token = line.trim();
        if token.is_empty() {
            if !builder.is_empty() {
                utterances.push(std::mem::replace(&mut builder, Builder::new()).finish());
            }
            continue;
        }
        builder.source.push_str(line);
        builder.source.push('\n');
        builder.token(token, config);
    }
    if !builder.is_empty() {
        utterances.push(builder.finish());
    }
    utterances
}

/// Read a corpus with one utterance per line, tokens separated by
/// whitespace.
pub fn read_utterance_per_line(content: &str, config: &Config) -> Vec<Utterance> {
    let mut utterances = Vec::new();

    for line in content.lines() {
        if is_comment(line, config) || line.trim().is_empty() {
            continue;
        }
        let mut builder = Builder::new();
        builder.source = line.to_string();
        for token in line.split_whitespace() {
            builder.token(token, config);
        }
        if !builder.is_empty() {
            utterances.push(builder.finish());
        }
    }
    utterances
}

fn is_comment(line: &str, config: &Config) -> bool {
    !config.comment_str.is_empty() && line.starts_with(&config.comment_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_per_line_splits_on_blank_lines() {
        let config = Config::default();
        let corpus = "the\ndog\n.\n\na\ncat\n";
        let utterances = read_word_per_line(corpus, &config);
        assert_eq!(utterances.len(), 2);
        assert_eq!(
            utterances[0].symbols,
            vec![
                InputSymbol::unit("the"),
                InputSymbol::unit("dog"),
                InputSymbol::Punct(PunctKind::FullStop),
                InputSymbol::Punct(PunctKind::EoUtterance),
            ]
        );
        assert_eq!(utterances[1].symbols.len(), 3); // a, cat, EoU
    }

    #[test]
    fn utterance_per_line_tokenizes_whitespace() {
        let config = Config::default();
        let utterances = read_utterance_per_line("the dog barks .\n", &config);
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].symbols.len(), 5);
        let gold = utterances[0].gold.as_ref().unwrap();
        assert_eq!(gold.terminals().len(), 4);
        assert_eq!(gold.count_content_units(), 3);
    }

    #[test]
    fn comment_lines_are_skipped() {
        let config = Config::default();
        let utterances = read_utterance_per_line("# header\nthe dog\n", &config);
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].symbols.len(), 3);
    }

    #[test]
    fn currency_is_punct_only_by_config() {
        let mut config = Config::default();
        assert_eq!(punct_of("$", &config), None);
        config.currency_symbol_is_punct = true;
        assert_eq!(punct_of("$", &config), Some(PunctKind::Currency));
    }

    #[test]
    fn discard_terminating_punct_drops_symbol_keeps_terminal() {
        let mut config = Config::default();
        config.discard_terminating_punct = true;
        let utterances = read_utterance_per_line("the dog .\n", &config);
        let utterance = &utterances[0];
        // the full stop is gone from the symbol stream...
        assert!(!utterance
            .symbols
            .iter()
            .any(|s| *s == InputSymbol::Punct(PunctKind::FullStop)));
        // ...but still a terminal of the gold tree
        assert_eq!(utterance.gold.as_ref().unwrap().terminals().len(), 3);
    }

    #[test]
    fn penn_escapes_map_to_parens() {
        let config = Config::default();
        assert_eq!(punct_of("-LRB-", &config), Some(PunctKind::LeftParen));
        assert_eq!(punct_of("-RRB-", &config), Some(PunctKind::RightParen));
    }
}
