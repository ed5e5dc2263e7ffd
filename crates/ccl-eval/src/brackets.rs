//! Reduction of constituent trees to bracket bags.
//!
//! Every non-terminal becomes the bitmap of the content units it covers;
//! empty terminals and punctuation are invisible. Non-terminals that
//! reduce to the same bitmap count once.

use ccl_common::{NodeId, SynTree};
use rustc_hash::FxHashSet;

use crate::bitmap::BitMap;

/// The bag of distinct brackets of one tree.
#[derive(Debug, Clone, Default)]
pub struct BracketBag {
    brackets: FxHashSet<BitMap>,
}

impl BracketBag {
    /// Reduce `tree`. `no_top` drops the bracket covering the whole
    /// utterance; `no_unary` drops brackets covering at most one content
    /// unit.
    pub fn from_tree(tree: &SynTree, no_top: bool, no_unary: bool) -> BracketBag {
        // content position of each terminal; punctuation and empties get
        // no position
        let mut content_pos = Vec::with_capacity(tree.terminals().len());
        let mut next = 0usize;
        for terminal in tree.terminals() {
            if terminal.punct || terminal.empty {
                content_pos.push(None);
            } else {
                content_pos.push(Some(next));
                next += 1;
            }
        }
        let total = next;

        let mut brackets = FxHashSet::default();
        for index in 0..tree.non_terminals().len() {
            let covered = tree.covered_terminals(NodeId::NonTerminal(index));
            let map: BitMap = covered
                .into_iter()
                .filter_map(|t| content_pos.get(t).copied().flatten())
                .collect();
            if map.is_empty() {
                continue;
            }
            if no_unary && map.count() <= 1 {
                continue;
            }
            if no_top && map.count() == total {
                continue;
            }
            brackets.insert(map);
        }

        BracketBag { brackets }
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    pub fn contains(&self, map: &BitMap) -> bool {
        self.brackets.contains(map)
    }

    /// How many brackets of `self` also occur in `other`.
    pub fn matched_in(&self, other: &BracketBag) -> usize {
        self.brackets
            .iter()
            .filter(|map| other.contains(map))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `((the dog) barks .)` with a punctuation terminal.
    fn parsed_tree() -> SynTree {
        let mut tree = SynTree::new();
        let the = tree.add_terminal("the", "", false, false);
        let dog = tree.add_terminal("dog", "", false, false);
        let barks = tree.add_terminal("barks", "", false, false);
        let stop = tree.add_terminal(".", "", true, false);
        let np = tree.add_non_terminal("", vec![the, dog]);
        tree.add_non_terminal("", vec![np, barks, stop]);
        tree
    }

    #[test]
    fn punctuation_is_invisible() {
        let bag = BracketBag::from_tree(&parsed_tree(), false, true);
        // {the dog} and {the dog barks}; the full stop never counts
        assert_eq!(bag.len(), 2);
        let np: BitMap = [0, 1].into_iter().collect();
        let top: BitMap = [0, 1, 2].into_iter().collect();
        assert!(bag.contains(&np));
        assert!(bag.contains(&top));
    }

    #[test]
    fn no_top_drops_the_full_span() {
        let bag = BracketBag::from_tree(&parsed_tree(), true, true);
        assert_eq!(bag.len(), 1);
        let top: BitMap = [0, 1, 2].into_iter().collect();
        assert!(!bag.contains(&top));
    }

    #[test]
    fn unary_brackets_are_dropped() {
        let mut tree = SynTree::new();
        let a = tree.add_terminal("a", "", false, false);
        let b = tree.add_terminal("b", "", false, false);
        let only_a = tree.add_non_terminal("", vec![a]);
        tree.add_non_terminal("", vec![only_a, b]);
        let bag = BracketBag::from_tree(&tree, false, true);
        assert_eq!(bag.len(), 1); // just {a b}
    }

    #[test]
    fn duplicate_spans_count_once() {
        let mut tree = SynTree::new();
        let a = tree.add_terminal("a", "", false, false);
        let b = tree.add_terminal("b", "", false, false);
        let inner = tree.add_non_terminal("", vec![a, b]);
        tree.add_non_terminal("", vec![inner]);
        let bag = BracketBag::from_tree(&tree, false, true);
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn matching_counts_shared_brackets() {
        let parsed = BracketBag::from_tree(&parsed_tree(), false, true);

        // gold: (the (dog barks)); only the top span is shared
        let mut gold = SynTree::new();
        let the = gold.add_terminal("the", "", false, false);
        let dog = gold.add_terminal("dog", "", false, false);
        let barks = gold.add_terminal("barks", "", false, false);
        let vp = gold.add_non_terminal("", vec![dog, barks]);
        gold.add_non_terminal("", vec![the, vp]);
        let gold = BracketBag::from_tree(&gold, false, true);

        assert_eq!(parsed.matched_in(&gold), 1);
        assert_eq!(gold.matched_in(&parsed), 1);
    }
}
