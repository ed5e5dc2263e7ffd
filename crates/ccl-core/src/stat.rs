//! Per-word adjacency statistics.
//!
//! Every lexical entry carries one [`CclStat`] chain per side, one table
//! per adjacency position. A table holds a dense vector of scalar counters
//! (the property grid below) and a bounded top list of label strengths
//! (`Seen`), keyed by [`Label`]. Scoring reads stable [`StatSnapshot`]
//! copies so that in-flight parsing never observes its own learning.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::label::Label;

/// Scalar counter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Number of learning events at this adjacency.
    Learn,
    /// Strength at which the utterance boundary (or stopping punctuation)
    /// was seen here.
    Block,
    In,
    Out,
}

/// Base counters are collected directly; derived counters accumulate
/// quotients of the opposite side's base counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    Base,
    Derived,
}

const PROP_COUNT: usize = 4;
const VEC_LEN: usize = PROP_COUNT * 2;

/// Dense code of a `(property, kind)` pair.
fn code(prop: Prop, kind: PropKind) -> usize {
    let p = match prop {
        Prop::Learn => 0,
        Prop::Block => 1,
        Prop::In => 2,
        Prop::Out => 3,
    };
    match kind {
        PropKind::Base => p,
        PropKind::Derived => PROP_COUNT + p,
    }
}

/// One statistics table: scalar counters plus the `Seen` label table.
///
/// Tables for adjacency positions 1, 2, … hang off position 0 through
/// `next`, created on demand.
#[derive(Debug)]
pub struct CclStat {
    vec: [f32; VEC_LEN],
    /// Top `Seen` labels, strongest first. Strengths here always mirror the
    /// accumulated totals in `seen_all`.
    top: Vec<(Label, f32)>,
    /// Accumulated `Seen` strength of every label ever seen here, including
    /// labels that have dropped off the top list.
    seen_all: FxHashMap<Label, f32>,
    top_max: usize,
    next: Option<Rc<RefCell<CclStat>>>,
}

impl CclStat {
    pub fn new(top_max: usize) -> CclStat {
        CclStat {
            vec: [0.0; VEC_LEN],
            top: Vec::new(),
            seen_all: FxHashMap::default(),
            top_max,
            next: None,
        }
    }

    pub fn new_shared(top_max: usize) -> Rc<RefCell<CclStat>> {
        Rc::new(RefCell::new(CclStat::new(top_max)))
    }

    /// The table for the next adjacency position, created if requested.
    pub fn next(&mut self, create: bool) -> Option<Rc<RefCell<CclStat>>> {
        if create && self.next.is_none() {
            self.next = Some(CclStat::new_shared(self.top_max));
        }
        self.next.clone()
    }

    /// The next table if it already exists.
    pub fn next_existing(&self) -> Option<Rc<RefCell<CclStat>>> {
        self.next.clone()
    }

    /// A table is empty until the first learning event.
    pub fn is_empty(&self) -> bool {
        self.val(Prop::Learn, PropKind::Base) == 0.0
    }

    pub fn val(&self, prop: Prop, kind: PropKind) -> f32 {
        self.vec[code(prop, kind)]
    }

    pub fn add(&mut self, prop: Prop, kind: PropKind, amount: f32) {
        self.vec[code(prop, kind)] += amount;
    }

    /// Quotient of two scalar counters; zero when the divisor is zero.
    pub fn qt(&self, p1: Prop, k1: PropKind, p2: Prop, k2: PropKind) -> f32 {
        let divisor = self.val(p2, k2);
        if divisor != 0.0 {
            self.val(p1, k1) / divisor
        } else {
            0.0
        }
    }

    /// Accumulate `Seen` strength for a label.
    ///
    /// The accumulated total always survives in `seen_all`; the top list is
    /// resifted, and a label outside it re-enters with its full total when
    /// that total reaches the tail strength (ties go to the newcomer).
    pub fn inc_seen(&mut self, label: &Label, amount: f32) {
        if amount < 0.0 {
            return;
        }
        let total = {
            let entry = self.seen_all.entry(label.clone()).or_insert(0.0);
            *entry += amount;
            *entry
        };

        if let Some(pos) = self.top.iter().position(|(l, _)| l == label) {
            self.top[pos].1 = total;
            self.sift_up(pos);
        } else if self.top.len() < self.top_max {
            self.top.push((label.clone(), total));
            self.sift_up(self.top.len() - 1);
        } else if let Some(last) = self.top.last_mut() {
            if total >= last.1 {
                *last = (label.clone(), total);
                self.sift_up(self.top.len() - 1);
            }
        }
    }

    /// Move the entry at `pos` up past every entry whose strength is not
    /// strictly higher, so that equal strengths order by recency.
    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 && self.top[pos - 1].1 <= self.top[pos].1 {
            self.top.swap(pos - 1, pos);
            pos -= 1;
        }
    }

    /// Top `Seen` labels in descending strength order.
    pub fn seen_top(&self) -> impl Iterator<Item = (&Label, f32)> {
        self.top.iter().map(|(l, s)| (l, *s))
    }

    pub fn top_len(&self) -> usize {
        self.top.len()
    }

    /// The accumulated `Seen` strength of a label (also for labels outside
    /// the top list).
    pub fn seen_strength(&self, label: &Label) -> f32 {
        self.seen_all.get(label).copied().unwrap_or(0.0)
    }
}

/// An immutable copy of one statistics table: the scalar vector by value
/// plus a few counts derived from the `Seen` top list. Stable under any
/// later mutation of the live table.
#[derive(Debug, Clone)]
pub struct StatSnapshot {
    vec: [f32; VEC_LEN],
    top_num: usize,
    stronger_than_block: usize,
    strongest: f32,
}

impl StatSnapshot {
    pub fn of(stat: &CclStat) -> StatSnapshot {
        let block = stat.val(Prop::Block, PropKind::Base);
        let mut stronger = 0;
        let mut strongest = 0.0;
        for (i, (_, strg)) in stat.top.iter().enumerate() {
            if i == 0 {
                strongest = *strg;
            }
            if *strg > block {
                stronger += 1;
            } else {
                break;
            }
        }
        StatSnapshot {
            vec: stat.vec,
            top_num: stat.top.len(),
            stronger_than_block: stronger,
            strongest,
        }
    }

    pub fn val(&self, prop: Prop, kind: PropKind) -> f32 {
        self.vec[code(prop, kind)]
    }

    pub fn qt(&self, p1: Prop, k1: PropKind, p2: Prop, k2: PropKind) -> f32 {
        let divisor = self.val(p2, k2);
        if divisor != 0.0 {
            self.val(p1, k1) / divisor
        } else {
            0.0
        }
    }

    pub fn top_num(&self) -> usize {
        self.top_num
    }

    pub fn stronger_than_block(&self) -> usize {
        self.stronger_than_block
    }

    /// Share of top labels stronger than `Block`; zero when the top list is
    /// empty.
    pub fn stronger_than_block_ratio(&self) -> f32 {
        if self.top_num == 0 {
            0.0
        } else {
            self.stronger_than_block as f32 / self.top_num as f32
        }
    }

    pub fn strongest(&self) -> f32 {
        self.strongest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn label(name: &str) -> Label {
        Label::new(Rc::from(name), true)
    }

    #[test]
    fn top_list_orders_by_strength() {
        let mut stat = CclStat::new(3);
        stat.inc_seen(&label("a"), 1.0);
        stat.inc_seen(&label("b"), 3.0);
        stat.inc_seen(&label("c"), 2.0);
        let top: Vec<_> = stat.seen_top().map(|(l, s)| (l.name().to_string(), s)).collect();
        assert_eq!(
            top,
            vec![
                ("b".to_string(), 3.0),
                ("c".to_string(), 2.0),
                ("a".to_string(), 1.0)
            ]
        );
    }

    #[test]
    fn equal_strength_orders_by_recency() {
        let mut stat = CclStat::new(3);
        stat.inc_seen(&label("a"), 2.0);
        stat.inc_seen(&label("b"), 2.0);
        let top: Vec<_> = stat.seen_top().map(|(l, _)| l.name().to_string()).collect();
        assert_eq!(top, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn full_list_tail_replaced_on_tie() {
        let mut stat = CclStat::new(2);
        stat.inc_seen(&label("a"), 3.0);
        stat.inc_seen(&label("b"), 1.0);
        stat.inc_seen(&label("c"), 1.0); // ties with the tail, recency wins
        let top: Vec<_> = stat.seen_top().map(|(l, _)| l.name().to_string()).collect();
        assert_eq!(top, vec!["a".to_string(), "c".to_string()]);
        // the evicted label keeps accumulating outside the list
        assert_eq!(stat.seen_strength(&label("b")), 1.0);
    }

    #[test]
    fn full_list_weaker_entry_dropped() {
        let mut stat = CclStat::new(2);
        stat.inc_seen(&label("a"), 3.0);
        stat.inc_seen(&label("b"), 2.0);
        stat.inc_seen(&label("c"), 1.0);
        let top: Vec<_> = stat.seen_top().map(|(l, _)| l.name().to_string()).collect();
        assert_eq!(top, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn dropped_label_reenters_with_full_total() {
        let mut stat = CclStat::new(2);
        stat.inc_seen(&label("a"), 3.0);
        stat.inc_seen(&label("b"), 2.0);
        stat.inc_seen(&label("c"), 1.0); // dropped
        stat.inc_seen(&label("c"), 4.0); // total 5, re-enters on top
        let top: Vec<_> = stat.seen_top().map(|(l, s)| (l.name().to_string(), s)).collect();
        assert_eq!(
            top,
            vec![("c".to_string(), 5.0), ("a".to_string(), 3.0)]
        );
    }

    #[test]
    fn snapshot_is_stable_under_mutation() {
        let mut stat = CclStat::new(4);
        stat.add(Prop::Learn, PropKind::Base, 2.0);
        stat.inc_seen(&label("a"), 2.0);
        let snap = StatSnapshot::of(&stat);

        stat.add(Prop::Learn, PropKind::Base, 10.0);
        stat.inc_seen(&label("b"), 9.0);

        assert_eq!(snap.val(Prop::Learn, PropKind::Base), 2.0);
        assert_eq!(snap.top_num(), 1);
        assert_eq!(snap.strongest(), 2.0);
    }

    #[test]
    fn stronger_than_block_stops_at_first_weak_entry() {
        let mut stat = CclStat::new(4);
        stat.add(Prop::Block, PropKind::Base, 2.0);
        stat.inc_seen(&label("a"), 5.0);
        stat.inc_seen(&label("b"), 1.0);
        stat.inc_seen(&label("c"), 4.0);
        let snap = StatSnapshot::of(&stat);
        assert_eq!(snap.top_num(), 3);
        assert_eq!(snap.stronger_than_block(), 2);
        assert!((snap.stronger_than_block_ratio() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn next_chain_created_on_demand() {
        let mut stat = CclStat::new(4);
        assert!(stat.next(false).is_none());
        let next = stat.next(true).unwrap();
        next.borrow_mut().add(Prop::Learn, PropKind::Base, 1.0);
        assert!(!stat.next(false).unwrap().borrow().is_empty());
    }

    #[test]
    fn quotients_guard_zero_divisor() {
        let mut stat = CclStat::new(4);
        assert_eq!(stat.qt(Prop::Block, PropKind::Base, Prop::Learn, PropKind::Base), 0.0);
        stat.add(Prop::Learn, PropKind::Base, 4.0);
        stat.add(Prop::Block, PropKind::Base, 1.0);
        assert_eq!(stat.qt(Prop::Block, PropKind::Base, Prop::Learn, PropKind::Base), 0.25);
    }
}
