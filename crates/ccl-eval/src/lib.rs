//! Bracket evaluation.
//!
//! Parsed bracketings are compared against a gold standard as bags of
//! brackets over content units (see [`brackets::BracketBag`]).
//! Precision and recall accumulate over utterances; F1 is derived.

pub mod bitmap;
pub mod brackets;

use std::fmt;

use ccl_common::SynTree;

use brackets::BracketBag;

/// Accumulating precision/recall evaluator.
///
/// While inactive, evaluation requests are ignored; this lets a run keep
/// one evaluator across passes and only score the passes of interest.
#[derive(Debug, Clone)]
pub struct PrecisionAndRecall {
    active: bool,
    /// Drop the bracket spanning the whole utterance from both sides.
    skip_top_bracket: bool,
    matched_parsed: f64,
    total_parsed: f64,
    matched_gold: f64,
    total_gold: f64,
    last_matched_parsed: f64,
    last_total_parsed: f64,
    last_matched_gold: f64,
    last_total_gold: f64,
}

impl PrecisionAndRecall {
    pub fn new(count_top_bracket: bool) -> PrecisionAndRecall {
        PrecisionAndRecall {
            active: true,
            skip_top_bracket: !count_top_bracket,
            matched_parsed: 0.0,
            total_parsed: 0.0,
            matched_gold: 0.0,
            total_gold: 0.0,
            last_matched_parsed: 0.0,
            last_total_parsed: 0.0,
            last_matched_gold: 0.0,
            last_total_gold: 0.0,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Score one utterance: `parsed` against the gold `standard`.
    pub fn from_trees(&mut self, standard: &SynTree, parsed: &SynTree) {
        if !self.active {
            return;
        }
        let gold = BracketBag::from_tree(standard, self.skip_top_bracket, true);
        let out = BracketBag::from_tree(parsed, self.skip_top_bracket, true);

        self.last_matched_parsed = out.matched_in(&gold) as f64;
        self.last_total_parsed = out.len() as f64;
        self.last_matched_gold = gold.matched_in(&out) as f64;
        self.last_total_gold = gold.len() as f64;

        self.matched_parsed += self.last_matched_parsed;
        self.total_parsed += self.last_total_parsed;
        self.matched_gold += self.last_matched_gold;
        self.total_gold += self.last_total_gold;
    }

    pub fn precision(&self) -> f64 {
        ratio(self.matched_parsed, self.total_parsed)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.matched_gold, self.total_gold)
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn last_precision(&self) -> f64 {
        ratio(self.last_matched_parsed, self.last_total_parsed)
    }

    pub fn last_recall(&self) -> f64 {
        ratio(self.last_matched_gold, self.last_total_gold)
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}

impl fmt::Display for PrecisionAndRecall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "precision {:.4} ({}/{}) recall {:.4} ({}/{}) f1 {:.4}",
            self.precision(),
            self.matched_parsed,
            self.total_parsed,
            self.recall(),
            self.matched_gold,
            self.total_gold,
            self.f1(),
        )
    }
}

/// Does the tree contain more than one distinct non-unary bracket? Used by
/// the non-trivial utterance filter.
pub fn non_trivial(tree: &SynTree) -> bool {
    BracketBag::from_tree(tree, false, true).len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_tree(words: &[&str]) -> SynTree {
        let mut tree = SynTree::new();
        let terminals: Vec<_> = words
            .iter()
            .map(|w| tree.add_terminal(w, "", false, false))
            .collect();
        tree.add_non_terminal("", terminals);
        tree
    }

    fn nested_tree(words: &[&str]) -> SynTree {
        let mut tree = SynTree::new();
        let mut terminals: Vec<_> = words
            .iter()
            .map(|w| tree.add_terminal(w, "", false, false))
            .collect();
        let rest = terminals.split_off(1);
        let inner = tree.add_non_terminal("", rest);
        tree.add_non_terminal("", vec![terminals[0], inner]);
        tree
    }

    #[test]
    fn identical_trees_score_perfectly() {
        let mut eval = PrecisionAndRecall::new(true);
        let tree = nested_tree(&["a", "b", "c"]);
        eval.from_trees(&tree, &tree);
        assert_eq!(eval.precision(), 1.0);
        assert_eq!(eval.recall(), 1.0);
        assert_eq!(eval.f1(), 1.0);
    }

    #[test]
    fn disjoint_bracketings_score_zero_without_top() {
        let mut eval = PrecisionAndRecall::new(false);
        // gold (a (b c)) vs parsed ((a b) c): without the top bracket the
        // remaining brackets are disjoint
        let gold = nested_tree(&["a", "b", "c"]);
        let mut parsed = SynTree::new();
        let a = parsed.add_terminal("a", "", false, false);
        let b = parsed.add_terminal("b", "", false, false);
        let c = parsed.add_terminal("c", "", false, false);
        let ab = parsed.add_non_terminal("", vec![a, b]);
        parsed.add_non_terminal("", vec![ab, c]);

        eval.from_trees(&gold, &parsed);
        assert_eq!(eval.precision(), 0.0);
        assert_eq!(eval.recall(), 0.0);
    }

    #[test]
    fn top_bracket_counts_when_configured() {
        let mut eval = PrecisionAndRecall::new(true);
        let gold = nested_tree(&["a", "b", "c"]);
        let parsed = flat_tree(&["a", "b", "c"]);
        eval.from_trees(&gold, &parsed);
        // the flat parse has exactly the top bracket, which matches
        assert_eq!(eval.precision(), 1.0);
        assert_eq!(eval.recall(), 0.5);
    }

    #[test]
    fn accumulates_across_utterances() {
        let mut eval = PrecisionAndRecall::new(true);
        let tree = nested_tree(&["a", "b", "c"]);
        eval.from_trees(&tree, &tree);
        eval.from_trees(&tree, &flat_tree(&["a", "b", "c"]));
        // 2 + 1 matched of 2 + 1 parsed; 2 + 1 matched of 2 + 2 gold
        assert_eq!(eval.precision(), 1.0);
        assert_eq!(eval.recall(), 0.75);
        assert_eq!(eval.last_recall(), 0.5);
    }

    #[test]
    fn inactive_evaluator_ignores_requests() {
        let mut eval = PrecisionAndRecall::new(true);
        eval.deactivate();
        let tree = nested_tree(&["a", "b"]);
        eval.from_trees(&tree, &tree);
        assert_eq!(eval.precision(), 0.0);
        eval.activate();
        eval.from_trees(&tree, &tree);
        assert_eq!(eval.precision(), 1.0);
    }

    #[test]
    fn trivial_trees_detected() {
        assert!(!non_trivial(&flat_tree(&["a", "b"])));
        assert!(non_trivial(&nested_tree(&["a", "b", "c"])));
    }
}
