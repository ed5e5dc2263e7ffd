//! Penn-Treebank-style corpus readers.
//!
//! Input files hold bracketed objects, one tree per object, possibly
//! spanning several lines. An object is converted to the gold tree (tags
//! split on `-`) and to the symbol stream for the parser. Punctuation and
//! empty-element detection differ per corpus, as do the punctuation code
//! tables.

use ccl_common::{Config, InputSymbol, PunctKind, SynTree};

use crate::error::CorpusError;
use crate::Utterance;

/// The supported treebank flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PennCorpus {
    /// Wall Street Journal sections of the Penn Treebank.
    Wsj,
    /// The Negra corpus (German) in Penn-style export.
    Negra,
    /// The Chinese Treebank.
    Ctb,
}

impl PennCorpus {
    /// Is the terminal with this surface form and tag punctuation?
    fn is_punct(self, unit: &str, tag: &str, config: &Config) -> bool {
        match self {
            PennCorpus::Wsj => {
                let Some(first) = tag.chars().next() else {
                    return false;
                };
                if first.is_alphanumeric() {
                    return false;
                }
                if tag == "$" || tag == "#" {
                    return config.currency_symbol_is_punct;
                }
                if tag == "-NONE-" {
                    return false;
                }
                !unit.chars().next().is_some_and(|c| c.is_alphanumeric())
            }
            PennCorpus::Negra => tag.starts_with('$'),
            PennCorpus::Ctb => tag == "PU",
        }
    }

    /// Is the terminal an empty element (trace or similar)?
    fn is_empty(self, unit: &str, tag: &str) -> bool {
        match self {
            PennCorpus::Wsj => tag == "-NONE-",
            PennCorpus::Negra => tag.starts_with("*T") && unit == "-",
            PennCorpus::Ctb => tag == "-NONE-",
        }
    }

    /// The punctuation class of a punctuation terminal.
    fn punct_code(self, unit: &str, tag: &str) -> PunctKind {
        match self {
            PennCorpus::Wsj => wsj_punct(unit)
                .or_else(|| wsj_punct(tag))
                .unwrap_or(PunctKind::FullStop),
            PennCorpus::Negra => negra_punct(unit).unwrap_or(PunctKind::FullStop),
            PennCorpus::Ctb => ctb_punct(unit).unwrap_or(PunctKind::FullStop),
        }
    }

    /// Besides comment lines, the CTB export carries XML-style markup
    /// lines that must be dropped.
    fn skip_line(self, line: &str, config: &Config) -> bool {
        if !config.comment_str.is_empty() && line.starts_with(&config.comment_str) {
            return true;
        }
        self == PennCorpus::Ctb && line.trim_start().starts_with('<')
    }
}

fn wsj_punct(s: &str) -> Option<PunctKind> {
    Some(match s {
        "." => PunctKind::FullStop,
        "?" => PunctKind::Question,
        "!" => PunctKind::Exclamation,
        ";" => PunctKind::SemiColon,
        "--" => PunctKind::Dash,
        ":" => PunctKind::Colon,
        "," => PunctKind::Comma,
        "..." => PunctKind::Ellipsis,
        "-LCB-" | "-LRB-" => PunctKind::LeftParen,
        "-RCB-" | "-RRB-" => PunctKind::RightParen,
        "``" => PunctKind::LeftDoubleQuote,
        "''" => PunctKind::RightDoubleQuote,
        "`" => PunctKind::LeftSingleQuote,
        "'" => PunctKind::RightSingleQuote,
        "-" => PunctKind::Hyphen,
        "$" | "#" => PunctKind::Currency,
        _ => return None,
    })
}

fn negra_punct(s: &str) -> Option<PunctKind> {
    Some(match s {
        "." | "\u{b7}" => PunctKind::FullStop,
        "?" => PunctKind::Question,
        "!" => PunctKind::Exclamation,
        ";" => PunctKind::SemiColon,
        "-" => PunctKind::Dash,
        ":" => PunctKind::Colon,
        "," => PunctKind::Comma,
        "..." => PunctKind::Ellipsis,
        "\"" => PunctKind::DoubleQuote,
        "'" => PunctKind::SingleQuote,
        "/" => PunctKind::HeadlineStop,
        "*LRB*" => PunctKind::LeftParen,
        "*RRB*" => PunctKind::RightParen,
        _ => return None,
    })
}

/// CTB punctuation in its UTF-8 forms; ASCII fallbacks included.
fn ctb_punct(s: &str) -> Option<PunctKind> {
    Some(match s {
        "\u{3002}" | "." => PunctKind::FullStop,
        "\u{ff0c}" | "\u{3001}" | "," => PunctKind::Comma,
        "\u{ff1f}" | "?" => PunctKind::Question,
        "\u{ff01}" | "!" => PunctKind::Exclamation,
        "\u{ff1a}" | ":" => PunctKind::Colon,
        "\u{ff1b}" | ";" => PunctKind::SemiColon,
        "\u{ff08}" | "(" => PunctKind::LeftParen,
        "\u{ff09}" | ")" => PunctKind::RightParen,
        "\u{201c}" => PunctKind::LeftDoubleQuote,
        "\u{201d}" => PunctKind::RightDoubleQuote,
        "\u{2018}" | "\u{300a}" | "\u{300c}" => PunctKind::LeftSingleQuote,
        "\u{2019}" | "\u{300b}" | "\u{300d}" => PunctKind::RightSingleQuote,
        "\u{2026}" | "\u{2026}\u{2026}" | "..." => PunctKind::Ellipsis,
        "\u{2014}" | "\u{2014}\u{2014}" | "-" | "--" | "----" => PunctKind::Dash,
        _ => return None,
    })
}

/// A raw bracketed object.
#[derive(Debug)]
struct Obj {
    name: String,
    children: Vec<Obj>,
}

/// Read every bracketed object of `content` and convert it to an
/// utterance.
pub fn read_penn(
    content: &str,
    corpus: PennCorpus,
    config: &Config,
) -> Result<Vec<Utterance>, CorpusError> {
    let mut utterances = Vec::new();
    for (source, line) in split_objects(content, corpus, config)? {
        let obj = parse_object(&source, line)?;
        utterances.push(object_to_utterance(&obj, source, corpus, config, line)?);
    }
    Ok(utterances)
}

/// Split the input into balanced-paren object strings, dropping comment
/// and markup lines. Returns each object with its starting line number.
fn split_objects(
    content: &str,
    corpus: PennCorpus,
    config: &Config,
) -> Result<Vec<(String, usize)>, CorpusError> {
    let mut objects = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut start_line = 1;

    for (idx, line) in content.lines().enumerate() {
        if corpus.skip_line(line, config) {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '(' => {
                    if depth == 0 {
                        current.clear();
                        start_line = idx + 1;
                    }
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    if depth > 0 {
                        depth -= 1;
                        current.push(ch);
                        if depth == 0 {
                            objects.push((std::mem::take(&mut current), start_line));
                        }
                    }
                }
                other => {
                    if depth > 0 {
                        current.push(other);
                    }
                }
            }
        }
        if depth > 0 {
            current.push('\n');
        }
    }
    if depth != 0 {
        return Err(CorpusError::malformed("unbalanced object", Some(start_line)));
    }
    Ok(objects)
}

/// Parse one balanced object string into the raw tree.
fn parse_object(source: &str, line: usize) -> Result<Obj, CorpusError> {
    let mut tokens = tokenize(source);
    let obj = parse_node(&mut tokens, line)?;
    if tokens.next().is_some() {
        return Err(CorpusError::malformed("trailing tokens after object", Some(line)));
    }
    Ok(obj)
}

fn tokenize(source: &str) -> std::vec::IntoIter<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for ch in source.chars() {
        match ch {
            '(' | ')' => {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
            }
            c => word.push(c),
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens.into_iter()
}

fn parse_node(
    tokens: &mut std::vec::IntoIter<String>,
    line: usize,
) -> Result<Obj, CorpusError> {
    match tokens.next() {
        Some(tok) if tok == "(" => parse_rest_of_node(tokens, line),
        _ => Err(CorpusError::malformed("expected '('", Some(line))),
    }
}

/// Parse a node whose opening '(' was already consumed. The first bare
/// word is the node's label; further bare words are leaf children.
fn parse_rest_of_node(
    tokens: &mut std::vec::IntoIter<String>,
    line: usize,
) -> Result<Obj, CorpusError> {
    let mut name = String::new();
    let mut children = Vec::new();
    let mut seen_any = false;

    loop {
        let Some(tok) = tokens.next() else {
            return Err(CorpusError::malformed("unbalanced object", Some(line)));
        };
        match tok.as_str() {
            ")" => return Ok(Obj { name, children }),
            "(" => {
                children.push(parse_rest_of_node(tokens, line)?);
                seen_any = true;
            }
            word => {
                if !seen_any && name.is_empty() && children.is_empty() {
                    name = word.to_string();
                } else {
                    children.push(Obj {
                        name: word.to_string(),
                        children: Vec::new(),
                    });
                }
                seen_any = true;
            }
        }
    }
}

/// Convert a raw object into the gold tree plus the symbol stream.
fn object_to_utterance(
    obj: &Obj,
    source: String,
    corpus: PennCorpus,
    config: &Config,
    line: usize,
) -> Result<Utterance, CorpusError> {
    let mut tree = SynTree::with_tag_split('-');
    append_node(obj, corpus, config, &mut tree, config.reverse_penn_objs, line)?;

    let mut symbols = Vec::new();
    for terminal in tree.terminals() {
        if terminal.empty {
            continue;
        }
        if terminal.punct {
            let kind = corpus.punct_code(&terminal.unit, &terminal.tag);
            if config.discard_terminating_punct && kind.is_terminating() {
                continue;
            }
            symbols.push(InputSymbol::Punct(kind));
        } else if config.use_tags_as_words {
            symbols.push(InputSymbol::unit(&terminal.tag));
        } else if config.use_tags_as_labels {
            symbols.push(InputSymbol::unit_with_label(&terminal.unit, &terminal.tag));
        } else {
            symbols.push(InputSymbol::unit(&terminal.unit));
        }
    }
    symbols.push(InputSymbol::Punct(PunctKind::EoUtterance));

    Ok(Utterance {
        symbols,
        gold: Some(tree),
        source,
    })
}

fn append_node(
    obj: &Obj,
    corpus: PennCorpus,
    config: &Config,
    tree: &mut SynTree,
    reverse: bool,
    line: usize,
) -> Result<ccl_common::NodeId, CorpusError> {
    if obj.children.is_empty() {
        return Err(CorpusError::malformed("unexpected leaf node", Some(line)));
    }

    // a node with a single bare-word child is a terminal
    if obj.children.len() == 1 && obj.children[0].children.is_empty() {
        let unit = &obj.children[0].name;
        let tag = &obj.name;
        return Ok(tree.add_terminal(
            unit,
            tag,
            corpus.is_punct(unit, tag, config),
            corpus.is_empty(unit, tag),
        ));
    }

    let mut sub_nodes = Vec::with_capacity(obj.children.len());
    let children: Box<dyn Iterator<Item = &Obj>> = if reverse {
        Box::new(obj.children.iter().rev())
    } else {
        Box::new(obj.children.iter())
    };
    for child in children {
        sub_nodes.push(append_node(child, corpus, config, tree, reverse, line)?);
    }
    Ok(tree.add_non_terminal(&obj.name, sub_nodes))
}
