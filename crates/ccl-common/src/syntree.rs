use std::fmt::Write as _;

use serde::Serialize;

/// Identifier of a node in a [`SynTree`].
///
/// Terminals and non-terminals live in separate tables; the id carries the
/// table. Non-terminals are created bottom-up, so a non-terminal always has
/// a higher index than everything it dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Terminal(usize),
    NonTerminal(usize),
}

/// A terminal of the constituent tree: a word, punctuation mark or empty
/// element, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct Terminal {
    pub unit: String,
    pub tag: String,
    /// Parts of a multi-part tag (split on the tree's tag separator).
    pub tag_parts: Vec<String>,
    pub punct: bool,
    pub empty: bool,
}

/// A non-terminal: an optional tag plus the nodes it directly dominates,
/// left to right.
#[derive(Debug, Clone, Serialize)]
pub struct NonTerminal {
    pub tag: String,
    pub dominated: Vec<NodeId>,
}

/// A constituent tree over one utterance.
///
/// Produced both by the corpus readers (the gold standard) and by the
/// parser (the induced bracketing); consumed by the evaluator and the
/// output printers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SynTree {
    terminals: Vec<Terminal>,
    non_terminals: Vec<NonTerminal>,
    /// Character on which terminal/non-terminal tags are split, if any.
    #[serde(skip)]
    tag_split: Option<char>,
}

impl SynTree {
    pub fn new() -> SynTree {
        SynTree::default()
    }

    /// A tree whose tags are split on `split` into [`Terminal::tag_parts`].
    pub fn with_tag_split(split: char) -> SynTree {
        SynTree {
            tag_split: Some(split),
            ..SynTree::default()
        }
    }

    pub fn add_terminal(&mut self, unit: &str, tag: &str, punct: bool, empty: bool) -> NodeId {
        let tag_parts = match self.tag_split {
            Some(split) if !tag.is_empty() => tag.split(split).map(str::to_string).collect(),
            _ => Vec::new(),
        };
        self.terminals.push(Terminal {
            unit: unit.to_string(),
            tag: tag.to_string(),
            tag_parts,
            punct,
            empty,
        });
        NodeId::Terminal(self.terminals.len() - 1)
    }

    pub fn add_non_terminal(&mut self, tag: &str, dominated: Vec<NodeId>) -> NodeId {
        self.non_terminals.push(NonTerminal {
            tag: tag.to_string(),
            dominated,
        });
        NodeId::NonTerminal(self.non_terminals.len() - 1)
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    pub fn non_terminals(&self) -> &[NonTerminal] {
        &self.non_terminals
    }

    pub fn terminal(&self, index: usize) -> Option<&Terminal> {
        self.terminals.get(index)
    }

    pub fn non_terminal(&self, index: usize) -> Option<&NonTerminal> {
        self.non_terminals.get(index)
    }

    /// The top node: the last non-terminal added, or the single terminal of
    /// a one-word tree.
    pub fn top(&self) -> Option<NodeId> {
        if !self.non_terminals.is_empty() {
            Some(NodeId::NonTerminal(self.non_terminals.len() - 1))
        } else if self.terminals.len() == 1 {
            Some(NodeId::Terminal(0))
        } else {
            None
        }
    }

    /// Number of terminals that are neither punctuation nor empty.
    pub fn count_content_units(&self) -> usize {
        self.terminals
            .iter()
            .filter(|t| !t.punct && !t.empty)
            .count()
    }

    /// The set of terminal indices dominated (directly or indirectly) by a
    /// node, in left-to-right order.
    pub fn covered_terminals(&self, node: NodeId) -> Vec<usize> {
        let mut covered = Vec::new();
        self.collect_covered(node, &mut covered);
        covered
    }

    fn collect_covered(&self, node: NodeId, out: &mut Vec<usize>) {
        match node {
            NodeId::Terminal(t) => out.push(t),
            NodeId::NonTerminal(n) => {
                for &child in &self.non_terminals[n].dominated {
                    self.collect_covered(child, out);
                }
            }
        }
    }

    /// Render the tree as a single-line bracketing, e.g. `((a b) c)`.
    pub fn bracket_string(&self) -> String {
        let mut out = String::new();
        match self.top() {
            Some(top) => self.write_node(top, &mut out),
            None => out.push_str("()"),
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        match node {
            NodeId::Terminal(t) => {
                let _ = write!(out, "{}", self.terminals[t].unit);
            }
            NodeId::NonTerminal(n) => {
                out.push('(');
                for (i, &child) in self.non_terminals[n].dominated.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.write_node(child, out);
                }
                out.push(')');
            }
        }
    }
}
