//! Utterance filters.
//!
//! A conjunction of simple predicates over the gold tree decides whether
//! an utterance is processed: a content-unit count bound, top-tag
//! inclusion and exclusion lists, and a non-triviality requirement.

use ccl_common::{NodeId, SynTree};

/// The filter settings of one pass.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Maximum number of content units; 0 means unbounded.
    pub max_units: u32,
    /// Accept only utterances whose top tag is one of these.
    pub top_tags: Vec<String>,
    /// Reject utterances whose top tag is one of these.
    pub exclude_tags: Vec<String>,
    /// Require more than one distinct non-unary bracket.
    pub non_trivial: bool,
}

impl Filter {
    /// Does the utterance pass every predicate? `None` (no gold tree)
    /// fails all but the trivial filter.
    pub fn matches(&self, gold: Option<&SynTree>) -> bool {
        if self.max_units > 0 {
            match gold {
                Some(tree) => {
                    if tree.count_content_units() > self.max_units as usize {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.top_tags.is_empty() && !top_tag_matches(gold, &self.top_tags) {
            return false;
        }
        if !self.exclude_tags.is_empty() && top_tag_matches(gold, &self.exclude_tags) {
            return false;
        }
        if self.non_trivial {
            match gold {
                Some(tree) => {
                    if !ccl_eval::non_trivial(tree) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    pub fn is_trivial(&self) -> bool {
        self.max_units == 0
            && self.top_tags.is_empty()
            && self.exclude_tags.is_empty()
            && !self.non_trivial
    }
}

/// Find the top labeled node (descending through untagged unary chains)
/// and compare its tag against `tags`.
fn top_tag_matches(gold: Option<&SynTree>, tags: &[String]) -> bool {
    let Some(tree) = gold else {
        return false;
    };
    let Some(mut node) = tree.top() else {
        return false;
    };

    loop {
        match node {
            NodeId::Terminal(index) => {
                let tag = &tree.terminals()[index].tag;
                return tags.iter().any(|t| t == tag);
            }
            NodeId::NonTerminal(index) => {
                let non_terminal = &tree.non_terminals()[index];
                if non_terminal.tag.is_empty() && non_terminal.dominated.len() == 1 {
                    node = non_terminal.dominated[0];
                    continue;
                }
                return tags.iter().any(|t| t == &non_terminal.tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged_tree(top_tag: &str, words: &[&str]) -> SynTree {
        let mut tree = SynTree::new();
        let terminals: Vec<_> = words
            .iter()
            .map(|w| tree.add_terminal(w, "", false, false))
            .collect();
        let inner = tree.add_non_terminal(top_tag, terminals);
        // corpus readers wrap objects in an untagged unary top node
        tree.add_non_terminal("", vec![inner]);
        tree
    }

    #[test]
    fn trivial_filter_accepts_everything() {
        let filter = Filter::default();
        assert!(filter.is_trivial());
        assert!(filter.matches(None));
        assert!(filter.matches(Some(&tagged_tree("S", &["a"]))));
    }

    #[test]
    fn word_count_bounds_content_units() {
        let filter = Filter {
            max_units: 2,
            ..Filter::default()
        };
        assert!(filter.matches(Some(&tagged_tree("S", &["a", "b"]))));
        assert!(!filter.matches(Some(&tagged_tree("S", &["a", "b", "c"]))));
        assert!(!filter.matches(None));
    }

    #[test]
    fn top_tag_descends_unary_chain() {
        let filter = Filter {
            top_tags: vec!["S".to_string()],
            ..Filter::default()
        };
        assert!(filter.matches(Some(&tagged_tree("S", &["a", "b"]))));
        assert!(!filter.matches(Some(&tagged_tree("NP", &["a", "b"]))));
    }

    #[test]
    fn exclusion_rejects_matching_tags() {
        let filter = Filter {
            exclude_tags: vec!["FRAG".to_string()],
            ..Filter::default()
        };
        assert!(!filter.matches(Some(&tagged_tree("FRAG", &["a"]))));
        assert!(filter.matches(Some(&tagged_tree("S", &["a"]))));
    }

    #[test]
    fn non_trivial_requires_nested_brackets() {
        let filter = Filter {
            non_trivial: true,
            ..Filter::default()
        };
        // flat tree: only one bracket
        assert!(!filter.matches(Some(&tagged_tree("S", &["a", "b"]))));

        let mut tree = SynTree::new();
        let a = tree.add_terminal("a", "", false, false);
        let b = tree.add_terminal("b", "", false, false);
        let c = tree.add_terminal("c", "", false, false);
        let inner = tree.add_non_terminal("NP", vec![b, c]);
        tree.add_non_terminal("S", vec![a, inner]);
        assert!(filter.matches(Some(&tree)));
    }
}
