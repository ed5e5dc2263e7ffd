//! Labels and per-unit label tables.
//!
//! A label is an interned string plus a side bit: labels that originated on
//! the adjacent ("other") side of an adjacency carry the bit set. Labels
//! are stored in their flipped form, so matching a statistics label against
//! the opposite side of another word is a plain equality lookup.

use ccl_common::Side;
use rustc_hash::FxHashMap;

use crate::stat::{CclStat, Prop, PropKind};

/// A label key. Flipping is an explicit operation, never implicit in a
/// copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    name: std::rc::Rc<str>,
    other_side: bool,
}

impl Label {
    pub fn new(name: std::rc::Rc<str>, other_side: bool) -> Label {
        Label { name, other_side }
    }

    /// The same label with the side bit toggled.
    pub fn flipped(&self) -> Label {
        Label {
            name: self.name.clone(),
            other_side: !self.other_side,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the label originated on the other side of the adjacency.
    pub fn is_other_side(&self) -> bool {
        self.other_side
    }
}

/// One side of a label table: a bounded strongest-first list plus the full
/// strengths of everything that was ever inserted.
#[derive(Debug, Default)]
struct LabelSide {
    top: Vec<(Label, f32)>,
    all: FxHashMap<Label, f32>,
}

/// The labels of a unit, one list per side.
///
/// Insertion keeps the maximum of the existing and the new strength; a
/// label's strength never decreases.
#[derive(Debug)]
pub struct LabelTable {
    sides: [LabelSide; 2],
    max_labels: usize,
}

impl LabelTable {
    pub fn new(max_labels: usize) -> LabelTable {
        LabelTable {
            sides: [LabelSide::default(), LabelSide::default()],
            max_labels,
        }
    }

    /// Insert `label` on `side` with max-merge semantics.
    pub fn add(&mut self, label: &Label, side: Side, strg: f32) {
        if strg <= 0.0 {
            return;
        }
        let max = self.max_labels;
        let entry = &mut self.sides[side.index()];
        let current = entry.all.entry(label.clone()).or_insert(0.0);
        if strg <= *current {
            return;
        }
        *current = strg;
        let total = *current;

        if let Some(pos) = entry.top.iter().position(|(l, _)| l == label) {
            entry.top[pos].1 = total;
            sift_up(&mut entry.top, pos);
        } else if entry.top.len() < max {
            entry.top.push((label.clone(), total));
            let pos = entry.top.len() - 1;
            sift_up(&mut entry.top, pos);
        } else if let Some(last) = entry.top.last_mut() {
            if total >= last.1 {
                *last = (label.clone(), total);
                let pos = entry.top.len() - 1;
                sift_up(&mut entry.top, pos);
            }
        }
    }

    /// Flip `label` and insert the flipped form.
    pub fn flip_and_add(&mut self, label: &Label, side: Side, strg: f32) {
        self.add(&label.flipped(), side, strg);
    }

    /// Register the unit's own surface form (or an extra input label).
    /// Stored pre-flipped on both sides so that opposite-side matching is a
    /// plain lookup.
    pub fn add_unit_label(&mut self, name: std::rc::Rc<str>, strg: f32) {
        let label = Label::new(name, true);
        self.add(&label, Side::Left, strg);
        self.add(&label, Side::Right, strg);
    }

    /// Copy the top `Seen` labels of a statistics table onto `side`,
    /// flipped, with strength `Seen/Learn`.
    pub fn add_adjacency_labels(&mut self, side: Side, stat: &CclStat) {
        if stat.is_empty() {
            return;
        }
        let learn = stat.val(Prop::Learn, PropKind::Base);
        let labels: Vec<(Label, f32)> = stat
            .seen_top()
            .map(|(label, strg)| {
                let normalized = if learn != 0.0 { strg / learn } else { 0.0 };
                (label.clone(), normalized)
            })
            .collect();
        for (label, strg) in labels {
            self.flip_and_add(&label, side, strg);
        }
    }

    /// Strength of `label` on `side`, zero if absent.
    pub fn strength(&self, label: &Label, side: Side) -> f32 {
        self.sides[side.index()]
            .all
            .get(label)
            .copied()
            .unwrap_or(0.0)
    }

    /// The top labels of `side`, strongest first.
    pub fn top(&self, side: Side) -> impl Iterator<Item = (&Label, f32)> {
        self.sides[side.index()].top.iter().map(|(l, s)| (l, *s))
    }
}

fn sift_up(top: &mut [(Label, f32)], mut pos: usize) {
    while pos > 0 && top[pos - 1].1 <= top[pos].1 {
        top.swap(pos - 1, pos);
        pos -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn label(name: &str, other: bool) -> Label {
        Label::new(Rc::from(name), other)
    }

    #[test]
    fn flip_toggles_side_bit() {
        let l = label("dog", false);
        assert!(l.flipped().is_other_side());
        assert_eq!(l.flipped().flipped(), l);
    }

    #[test]
    fn flipped_label_is_a_distinct_key() {
        let this_side = label("dog", false);
        let other_side = label("dog", true);
        assert_ne!(this_side, other_side);
    }

    #[test]
    fn add_keeps_maximum_strength() {
        let mut table = LabelTable::new(4);
        let l = label("dog", true);
        table.add(&l, Side::Left, 0.5);
        table.add(&l, Side::Left, 0.2);
        assert_eq!(table.strength(&l, Side::Left), 0.5);
        table.add(&l, Side::Left, 0.9);
        assert_eq!(table.strength(&l, Side::Left), 0.9);
    }

    #[test]
    fn unit_label_lands_flipped_on_both_sides() {
        let mut table = LabelTable::new(4);
        table.add_unit_label(Rc::from("dog"), 1.0);
        let flipped = label("dog", true);
        assert_eq!(table.strength(&flipped, Side::Left), 1.0);
        assert_eq!(table.strength(&flipped, Side::Right), 1.0);
        assert_eq!(table.strength(&label("dog", false), Side::Left), 0.0);
    }

    #[test]
    fn adjacency_labels_are_flipped_and_normalized() {
        let mut stat = CclStat::new(4);
        stat.add(Prop::Learn, PropKind::Base, 2.0);
        stat.inc_seen(&label("the", true), 1.0);

        let mut table = LabelTable::new(4);
        table.add_adjacency_labels(Side::Left, &stat);

        // stored flipped: other-side bit cleared
        assert_eq!(table.strength(&label("the", false), Side::Left), 0.5);
        assert_eq!(table.strength(&label("the", true), Side::Left), 0.0);
    }

    #[test]
    fn bounded_top_list_keeps_strongest() {
        let mut table = LabelTable::new(2);
        table.add(&label("a", true), Side::Right, 1.0);
        table.add(&label("b", true), Side::Right, 3.0);
        table.add(&label("c", true), Side::Right, 2.0);
        let top: Vec<_> = table
            .top(Side::Right)
            .map(|(l, _)| l.name().to_string())
            .collect();
        assert_eq!(top, vec!["b".to_string(), "c".to_string()]);
        // the dropped label still answers strength queries
        assert_eq!(table.strength(&label("a", true), Side::Right), 1.0);
    }
}
