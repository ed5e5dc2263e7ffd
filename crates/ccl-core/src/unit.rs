//! The per-utterance word unit.
//!
//! A unit borrows its word's statistics chains from the lexicon (shared for
//! the duration of the utterance), carries the word's label table, a
//! snapshot of the first adjacency statistics per side, the bitmap of
//! consumed adjacency positions and any stopping punctuation seen next to
//! the word.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ccl_common::{PunctKind, Side};

use crate::label::LabelTable;
use crate::stat::{CclStat, StatSnapshot};

/// An adjacency position of a unit: a side plus the 0-based position in the
/// statistics chain. `pos` is `-1` when there is no position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjPos {
    pub side: Side,
    pub pos: i32,
}

impl AdjPos {
    pub fn new(side: Side, pos: i32) -> AdjPos {
        AdjPos { side, pos }
    }
}

/// Adjacency positions are limited to one bitmap word per side; positions
/// beyond that neither mark nor report as used.
const ADJ_BITS: i32 = 32;

#[derive(Debug)]
pub struct Unit {
    name: Rc<str>,
    labels: LabelTable,
    stats: [Rc<RefCell<CclStat>>; 2],
    stat_copy: [StatSnapshot; 2],
    adj_used: [Cell<u32>; 2],
    stop_punct: [Cell<Option<PunctKind>>; 2],
}

impl Unit {
    /// Build a unit for a word.
    ///
    /// `unit_labels` are the word's own labels (its surface form first,
    /// then any input labels); `stats` are the lexicon entry's chains.
    pub fn new(
        name: Rc<str>,
        unit_labels: &[Rc<str>],
        stats: [Rc<RefCell<CclStat>>; 2],
        max_labels: usize,
    ) -> Unit {
        let mut labels = LabelTable::new(max_labels);
        for label in unit_labels {
            labels.add_unit_label(label.clone(), 1.0);
        }
        for side in Side::both() {
            labels.add_adjacency_labels(side, &stats[side.index()].borrow());
        }
        let stat_copy = [
            StatSnapshot::of(&stats[0].borrow()),
            StatSnapshot::of(&stats[1].borrow()),
        ];
        Unit {
            name,
            labels,
            stats,
            stat_copy,
            adj_used: [Cell::new(0), Cell::new(0)],
            stop_punct: [Cell::new(None), Cell::new(None)],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// The statistics table at an adjacency position, walking the chain.
    /// With `create` set, missing chain members are created.
    pub fn stats_at(&self, adj: AdjPos, create: bool) -> Option<Rc<RefCell<CclStat>>> {
        if adj.pos < 0 {
            return None;
        }
        let mut current = self.stats[adj.side.index()].clone();
        for _ in 0..adj.pos {
            let next = if create {
                current.borrow_mut().next(true)?
            } else {
                current.borrow().next_existing()?
            };
            current = next;
        }
        Some(current)
    }

    /// The construction-time snapshot of the first adjacency position.
    pub fn stat_copy(&self, side: Side) -> &StatSnapshot {
        &self.stat_copy[side.index()]
    }

    pub fn adj_used(&self, adj: AdjPos) -> bool {
        if adj.pos < 0 || adj.pos >= ADJ_BITS {
            return false;
        }
        self.adj_used[adj.side.index()].get() & (1 << adj.pos) != 0
    }

    pub fn set_adj_used(&self, adj: AdjPos) {
        if adj.pos < 0 || adj.pos >= ADJ_BITS {
            return;
        }
        let cell = &self.adj_used[adj.side.index()];
        cell.set(cell.get() | (1 << adj.pos));
    }

    pub fn stop_punct(&self, side: Side) -> Option<PunctKind> {
        self.stop_punct[side.index()].get()
    }

    pub fn set_stop_punct(&self, side: Side, punct: Option<PunctKind>) {
        self.stop_punct[side.index()].set(punct);
    }
}
