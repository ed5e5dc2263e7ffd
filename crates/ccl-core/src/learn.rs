//! Deferred learning.
//!
//! Learning events are queued while an utterance is parsed and applied
//! only when it terminates, so the statistics the scorer reads stay stable
//! within the utterance. An utterance that ends abnormally drops its queue
//! unrealized.

use std::collections::VecDeque;

use ccl_common::Side;

use crate::set::CclSet;
use crate::stat::{Prop, PropKind};
use crate::unit::AdjPos;

/// One deferred learning event: the learning word, the adjacency position
/// learned, and the word found there (`None` marks a blocked adjacency,
/// e.g. the utterance boundary or stopping punctuation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnEvent {
    pub unit: i32,
    pub adj: AdjPos,
    pub adj_unit: Option<i32>,
}

/// FIFO queue of learning events for the current utterance.
#[derive(Debug, Default)]
pub struct LearnQueue {
    events: VecDeque<LearnEvent>,
}

impl LearnQueue {
    pub fn new() -> LearnQueue {
        LearnQueue::default()
    }

    pub fn push(&mut self, event: LearnEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drop all queued events without applying them.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Apply every queued event, in order, to the statistics shared
    /// between the utterance's units and the lexicon.
    pub fn realize(&mut self, set: &CclSet) {
        while let Some(event) = self.events.pop_front() {
            apply(&event, set);
        }
    }
}

fn apply(event: &LearnEvent, set: &CclSet) {
    let Some(unit) = set.unit(event.unit) else {
        return;
    };
    let Some(stats) = unit.stats_at(event.adj, true) else {
        return;
    };
    let mut stats = stats.borrow_mut();
    let side = event.adj.side;

    stats.add(Prop::Learn, PropKind::Base, 1.0);

    let adj_unit = event.adj_unit.and_then(|pos| set.unit(pos));
    if adj_unit.is_none() || unit.stop_punct(side).is_some() {
        stats.add(Prop::Block, PropKind::Base, 1.0);
        return;
    }
    let adj_unit = adj_unit.expect("checked above");

    // every label of the adjacent word on the facing side is seen here
    // with its own strength
    for (label, strg) in adj_unit.labels().top(side.opposite()) {
        stats.inc_seen(label, strg);
    }

    // first adjacency position: propagate global properties from the
    // adjacent word's stable snapshots
    if event.adj.pos == 0 {
        let op_copy = adj_unit.stat_copy(side.opposite());
        let op_op_copy = adj_unit.stat_copy(side);

        if op_copy.top_num() > 0 {
            if op_copy.stronger_than_block_ratio() == 0.0 {
                stats.add(Prop::In, PropKind::Base, -1.0);
            } else if op_op_copy.stronger_than_block_ratio() == 0.0 {
                stats.add(Prop::In, PropKind::Base, 1.0);
            }
        }

        stats.add(
            Prop::Out,
            PropKind::Base,
            op_copy.qt(Prop::In, PropKind::Base, Prop::Learn, PropKind::Base),
        );
        stats.add(
            Prop::In,
            PropKind::Derived,
            op_copy.qt(Prop::Out, PropKind::Base, Prop::Learn, PropKind::Base),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::CclStat;
    use crate::unit::Unit;
    use std::rc::Rc;

    fn test_set(names: &[&str]) -> CclSet {
        let mut set = CclSet::new();
        for name in names {
            let key: Rc<str> = Rc::from(*name);
            let unit = Unit::new(
                key.clone(),
                &[key],
                [CclStat::new_shared(10), CclStat::new_shared(10)],
                10,
            );
            set.advance(unit).unwrap();
        }
        set
    }

    #[test]
    fn block_event_increments_learn_and_block() {
        let set = test_set(&["a"]);
        let mut queue = LearnQueue::new();
        queue.push(LearnEvent {
            unit: 0,
            adj: AdjPos::new(Side::Left, 0),
            adj_unit: None,
        });
        queue.realize(&set);

        let stats = set
            .unit(0)
            .unwrap()
            .stats_at(AdjPos::new(Side::Left, 0), false)
            .unwrap();
        let stats = stats.borrow();
        assert_eq!(stats.val(Prop::Learn, PropKind::Base), 1.0);
        assert_eq!(stats.val(Prop::Block, PropKind::Base), 1.0);
    }

    #[test]
    fn adjacency_event_copies_labels() {
        let set = test_set(&["a", "b"]);
        let mut queue = LearnQueue::new();
        // b learns a on its left
        queue.push(LearnEvent {
            unit: 1,
            adj: AdjPos::new(Side::Left, 0),
            adj_unit: Some(0),
        });
        queue.realize(&set);

        let stats = set
            .unit(1)
            .unwrap()
            .stats_at(AdjPos::new(Side::Left, 0), false)
            .unwrap();
        let stats = stats.borrow();
        assert_eq!(stats.val(Prop::Learn, PropKind::Base), 1.0);
        assert_eq!(stats.val(Prop::Block, PropKind::Base), 0.0);
        // the label "a" (stored flipped in a's own table) was seen once
        let seen: Vec<_> = stats.seen_top().map(|(l, s)| (l.name().to_string(), s)).collect();
        assert_eq!(seen, vec![("a".to_string(), 1.0)]);
    }

    #[test]
    fn stop_punct_turns_event_into_block() {
        let set = test_set(&["a", "b"]);
        set.unit(1)
            .unwrap()
            .set_stop_punct(Side::Left, Some(ccl_common::PunctKind::Comma));
        let mut queue = LearnQueue::new();
        queue.push(LearnEvent {
            unit: 1,
            adj: AdjPos::new(Side::Left, 0),
            adj_unit: Some(0),
        });
        queue.realize(&set);

        let stats = set
            .unit(1)
            .unwrap()
            .stats_at(AdjPos::new(Side::Left, 0), false)
            .unwrap();
        assert_eq!(stats.borrow().val(Prop::Block, PropKind::Base), 1.0);
        assert_eq!(stats.borrow().top_len(), 0);
    }

    #[test]
    fn events_apply_in_order_and_queue_empties() {
        let set = test_set(&["a", "b"]);
        let mut queue = LearnQueue::new();
        for _ in 0..3 {
            queue.push(LearnEvent {
                unit: 0,
                adj: AdjPos::new(Side::Right, 0),
                adj_unit: Some(1),
            });
        }
        assert_eq!(queue.len(), 3);
        queue.realize(&set);
        assert!(queue.is_empty());

        let stats = set
            .unit(0)
            .unwrap()
            .stats_at(AdjPos::new(Side::Right, 0), false)
            .unwrap();
        assert_eq!(stats.borrow().val(Prop::Learn, PropKind::Base), 3.0);
    }

    #[test]
    fn clear_discards_events() {
        let set = test_set(&["a"]);
        let mut queue = LearnQueue::new();
        queue.push(LearnEvent {
            unit: 0,
            adj: AdjPos::new(Side::Left, 0),
            adj_unit: None,
        });
        queue.clear();
        queue.realize(&set);

        let stats = set
            .unit(0)
            .unwrap()
            .stats_at(AdjPos::new(Side::Left, 0), false)
            .unwrap();
        assert_eq!(stats.borrow().val(Prop::Learn, PropKind::Base), 0.0);
    }

    #[test]
    fn second_adjacency_position_skips_global_propagation() {
        let set = test_set(&["a", "b"]);
        let mut queue = LearnQueue::new();
        queue.push(LearnEvent {
            unit: 0,
            adj: AdjPos::new(Side::Right, 1),
            adj_unit: Some(1),
        });
        queue.realize(&set);

        let stats = set
            .unit(0)
            .unwrap()
            .stats_at(AdjPos::new(Side::Right, 1), false)
            .unwrap();
        let stats = stats.borrow();
        assert_eq!(stats.val(Prop::Learn, PropKind::Base), 1.0);
        assert_eq!(stats.val(Prop::Out, PropKind::Base), 0.0);
        assert_eq!(stats.val(Prop::In, PropKind::Derived), 0.0);
    }
}
