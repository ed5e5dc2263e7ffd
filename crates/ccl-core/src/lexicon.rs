//! The lexicon: interned surface forms mapped to per-word statistics.
//!
//! Entries persist for the lifetime of the process, so statistics
//! accumulate across utterances and passes over a corpus. Units share the
//! entry's statistics tables by reference for the duration of their
//! utterance.

use std::cell::RefCell;
use std::rc::Rc;

use ccl_common::Side;
use rustc_hash::FxHashMap;

use crate::stat::CclStat;

/// One lexical entry: occurrence count plus a statistics chain per side.
#[derive(Debug)]
pub struct LexEntry {
    pub count: u32,
    stats: [Rc<RefCell<CclStat>>; 2],
}

impl LexEntry {
    fn new(top_max: usize) -> LexEntry {
        LexEntry {
            count: 0,
            stats: [CclStat::new_shared(top_max), CclStat::new_shared(top_max)],
        }
    }

    pub fn stats(&self, side: Side) -> Rc<RefCell<CclStat>> {
        self.stats[side.index()].clone()
    }

    pub fn stats_pair(&self) -> [Rc<RefCell<CclStat>>; 2] {
        [self.stats[0].clone(), self.stats[1].clone()]
    }
}

/// Interning map from lowercased surface form to lexical entry.
///
/// Labels that are not words of the corpus are interned here as well, so
/// every equal string is one shared allocation. Entries are never removed.
#[derive(Debug)]
pub struct Lexicon {
    interned: FxHashMap<Rc<str>, Rc<str>>,
    entries: FxHashMap<Rc<str>, Rc<RefCell<LexEntry>>>,
    stat_top_max: usize,
}

impl Lexicon {
    /// `stat_top_max` bounds the `Seen` top lists of every statistics table
    /// created by this lexicon.
    pub fn new(stat_top_max: usize) -> Lexicon {
        Lexicon {
            interned: FxHashMap::default(),
            entries: FxHashMap::default(),
            stat_top_max,
        }
    }

    /// Intern a string, returning the shared allocation.
    pub fn intern(&mut self, s: &str) -> Rc<str> {
        if let Some(existing) = self.interned.get(s) {
            return existing.clone();
        }
        let shared: Rc<str> = Rc::from(s);
        self.interned.insert(shared.clone(), shared.clone());
        shared
    }

    /// Look up `name`, creating an empty entry if it is new. Returns the
    /// interned key and the entry.
    pub fn entry(&mut self, name: &str) -> (Rc<str>, Rc<RefCell<LexEntry>>) {
        let key = self.intern(name);
        let top_max = self.stat_top_max;
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Rc::new(RefCell::new(LexEntry::new(top_max))))
            .clone();
        (key, entry)
    }

    /// Look up `name` without creating it.
    pub fn get(&self, name: &str) -> Option<Rc<RefCell<LexEntry>>> {
        self.entries.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries ordered by descending occurrence count (count ties in
    /// arbitrary order), for the lexicon dump.
    pub fn by_descending_count(&self) -> Vec<(Rc<str>, Rc<RefCell<LexEntry>>)> {
        let mut all: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| {
            let ca = a.1.borrow().count;
            let cb = b.1.borrow().count;
            cb.cmp(&ca).then_with(|| a.0.cmp(&b.0))
        });
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_allocations() {
        let mut lex = Lexicon::new(10);
        let a = lex.intern("dog");
        let b = lex.intern("dog");
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn entry_created_once() {
        let mut lex = Lexicon::new(10);
        let (_, e1) = lex.entry("dog");
        e1.borrow_mut().count += 1;
        let (_, e2) = lex.entry("dog");
        assert_eq!(e2.borrow().count, 1);
        assert_eq!(lex.len(), 1);
    }

    #[test]
    fn stats_are_shared_with_the_entry() {
        let mut lex = Lexicon::new(10);
        let (_, entry) = lex.entry("dog");
        let left = entry.borrow().stats(Side::Left);
        left.borrow_mut()
            .add(crate::stat::Prop::Learn, crate::stat::PropKind::Base, 1.0);
        assert!(!entry.borrow().stats(Side::Left).borrow().is_empty());
    }

    #[test]
    fn dump_order_is_by_count() {
        let mut lex = Lexicon::new(10);
        let (_, a) = lex.entry("rare");
        a.borrow_mut().count = 1;
        let (_, b) = lex.entry("common");
        b.borrow_mut().count = 9;
        let order: Vec<_> = lex
            .by_descending_count()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(order, vec!["common".to_string(), "rare".to_string()]);
    }
}
