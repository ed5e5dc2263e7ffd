//! The bracket layer over the CCL set.
//!
//! Brackets are derived from the links in lock-step with the set: whenever
//! the set advances past a word (or the utterance closes), the bracketing
//! of the current last word is finalized from its final link state. Every
//! bracket is allocated from a per-utterance arena and addressed by index;
//! the whole arena is dropped when the utterance is cleared.
//!
//! Per node `x` there are up to two brackets: `B1(x)`, the minimal bracket
//! covering `x` (its left end is the farthest depth-0 leftward reach of
//! `x`), and `B2(x)`, created above `B1(x)` when a depth-1 link escapes
//! it.

use std::collections::VecDeque;

use ccl_common::{NodeId, Side, SynTree};

use crate::set::{CclSet, SetError};
use crate::unit::Unit;

pub type BracketId = usize;

/// A single bracket. The right end is -1 while the bracket still covers
/// the last node of the utterance.
#[derive(Debug)]
pub struct Bracket {
    pub left: i32,
    pub right: i32,
    /// Leftmost node from which a link escapes this bracket; -1 if none.
    /// Written once, by the first escape.
    pub escapes: i32,
    /// Directly dominated brackets, left to right.
    dominated: VecDeque<BracketId>,
}

/// The CCL set together with its bracketing.
#[derive(Debug, Default)]
pub struct CclBrackets {
    set: CclSet,
    arena: Vec<Bracket>,
    /// Brackets covering the last node, outermost first.
    cover_last: Vec<BracketId>,
    /// Maximal brackets not covering the last node, left to right. Pruned
    /// lazily: entries may be shadowed by a later, wider bracket until the
    /// next closing pass or [`CclBrackets::max_brackets`] call.
    max_not_end: Vec<BracketId>,
    b1: Vec<BracketId>,
    b2: Vec<Option<BracketId>>,
    /// Last node position the bracketing was computed for.
    up_to: i32,
}

impl CclBrackets {
    pub fn new() -> CclBrackets {
        CclBrackets {
            up_to: -1,
            ..CclBrackets::default()
        }
    }

    pub fn set(&self) -> &CclSet {
        &self.set
    }

    pub fn clear(&mut self) {
        self.set.clear();
        self.arena.clear();
        self.cover_last.clear();
        self.max_not_end.clear();
        self.b1.clear();
        self.b2.clear();
        self.up_to = -1;
    }

    pub fn bracket(&self, id: BracketId) -> &Bracket {
        &self.arena[id]
    }

    /// The minimal bracket generated by the node at `pos`, once the
    /// bracketing has been computed up to it.
    pub fn b1(&self, pos: i32) -> Option<BracketId> {
        self.b1.get(usize::try_from(pos).ok()?).copied()
    }

    pub fn b2(&self, pos: i32) -> Option<BracketId> {
        self.b2.get(usize::try_from(pos).ok()?).copied().flatten()
    }

    /// Append the next word, finalizing the bracketing of the current last
    /// word first.
    pub fn advance(&mut self, unit: Unit) -> Result<(), SetError> {
        if !self.set.can_advance() {
            return Err(SetError::RvPending);
        }
        self.update();
        self.set.advance(unit)
    }

    /// Close the utterance: no further links, bracketing final. Safe to
    /// call repeatedly.
    pub fn close_utterance(&mut self) -> Result<(), SetError> {
        self.set.close()?;
        self.update();
        Ok(())
    }

    pub fn add_link(&mut self, base: i32, head: i32, depth: u32) -> Result<(), SetError> {
        self.set.add_link(base, head, depth)
    }

    fn new_bracket(&mut self, left: i32) -> BracketId {
        self.arena.push(Bracket {
            left,
            right: -1,
            escapes: -1,
            dominated: VecDeque::new(),
        });
        self.arena.len() - 1
    }

    /// Finalize the bracketing for the current last node. Idempotent per
    /// node.
    fn update(&mut self) {
        let last = self.set.last_node();
        if self.up_to == last {
            return;
        }
        self.up_to = last;
        if last < 0 {
            return;
        }

        let inbound = self.set.inbound(last, Side::Left);

        // A covering bracket is extended to the last node only if a link
        // from inside it reaches the last node; everything else closes at
        // the previous position. Each bracket closes at most once, so the
        // total work stays linear in the number of brackets.
        let mut max_not_extended: Option<BracketId> = None;
        while let Some(&inner) = self.cover_last.last() {
            let close = match inbound {
                None => true,
                Some(inb) => {
                    self.arena[inner].left > inb.end
                        || (inb.depth == 1 && inner == self.b1[inb.end as usize])
                }
            };
            if !close {
                break;
            }
            self.arena[inner].right = last - 1;
            max_not_extended = Some(inner);
            self.cover_last.pop();
        }

        if let Some(closed) = max_not_extended {
            let left = self.arena[closed].left;
            while let Some(&back) = self.max_not_end.last() {
                if self.arena[back].left < left {
                    break;
                }
                self.max_not_end.pop();
            }
            self.max_not_end.push(closed);
        }

        // A depth-1 inbound link escaping B1 of its head demands one
        // bracket above it. Only the first escape through a node creates
        // it; the escape mark is never overwritten.
        if let Some(inb) = inbound {
            let b1_head = self.b1[inb.end as usize];
            if inb.depth == 1 && self.arena[b1_head].escapes < 0 {
                self.arena[b1_head].escapes = last;
                let escape = self.new_bracket(self.arena[b1_head].left);
                self.b2[inb.end as usize] = Some(escape);
                if let Some(&inner) = self.cover_last.last() {
                    // the escape bracket replaces the closed child
                    self.arena[inner].dominated.pop_back();
                    self.arena[inner].dominated.push_back(escape);
                }
                self.arena[escape].dominated.push_back(b1_head);
                self.cover_last.push(escape);
            }
        }

        // B1(last): shared with the still-open bracket of the latest
        // depth-0 leftward link head, or freshly created
        let mut b1_created = false;
        let last_out0 = self.set.last_outbound0(last, Side::Left);
        let b1_last = if last_out0 < last && self.arena[self.b1[last_out0 as usize]].right < 0 {
            self.b1[last_out0 as usize]
        } else {
            let left = self.set.longest_path_at(last, Side::Left, 0);
            let id = self.new_bracket(left);
            for i in (0..self.max_not_end.len()).rev() {
                let m = self.max_not_end[i];
                if self.arena[m].left < left {
                    break;
                }
                self.arena[id].dominated.push_front(m);
            }
            b1_created = true;
            id
        };
        self.b1.push(b1_last);

        // B2(last): only when the latest leftward link has depth 1
        let mut b2_created = false;
        let b2_last = match self.set.last_outbound(last, Side::Left) {
            Some(lp) if lp.depth == 1 => {
                let b2_left = self.set.longest_path(last, Side::Left);
                // the bracket may already sit in the cover list, below the
                // spot where B1(last) will go
                let in_list = if b1_created { 1 } else { 2 };
                let existing = self
                    .cover_last
                    .len()
                    .checked_sub(in_list)
                    .map(|i| self.cover_last[i])
                    .filter(|&id| self.arena[id].left == b2_left);
                match existing {
                    Some(id) => Some(id),
                    None => {
                        let id = self.new_bracket(b2_left);
                        self.arena[b1_last].escapes = last;
                        let b1_left = self.arena[b1_last].left;
                        for i in (0..self.max_not_end.len()).rev() {
                            let m = self.max_not_end[i];
                            if self.arena[m].left < b2_left {
                                break;
                            }
                            if self.arena[m].left < b1_left {
                                self.arena[id].dominated.push_front(m);
                            }
                        }
                        b2_created = true;
                        Some(id)
                    }
                }
            }
            _ => None,
        };
        self.b2.push(b2_last);

        if b2_created {
            let b2_id = b2_last.expect("b2_created implies a bracket");
            if !b1_created {
                // the shared B1 comes back on top of B2 below
                self.cover_last.pop();
            }
            self.splice_under_innermost(b2_id);
            self.cover_last.push(b2_id);
        }

        if b1_created || b2_created {
            self.splice_under_innermost(b1_last);
            self.cover_last.push(b1_last);
        }
    }

    /// Make `id` the rightmost child of the innermost covering bracket,
    /// displacing children it now covers.
    fn splice_under_innermost(&mut self, id: BracketId) {
        let Some(&inner) = self.cover_last.last() else {
            return;
        };
        let left = self.arena[id].left;
        loop {
            let Some(&dom) = self.arena[inner].dominated.back() else {
                break;
            };
            if self.arena[dom].left < left {
                break;
            }
            self.arena[inner].dominated.pop_back();
        }
        self.arena[inner].dominated.push_back(id);
    }

    /// The maximal brackets of the utterance, left to right.
    pub fn max_brackets(&self) -> Vec<BracketId> {
        let mut max = self.max_not_end.clone();
        if let Some(&outer) = self.cover_last.first() {
            let left = self.arena[outer].left;
            while let Some(&back) = max.last() {
                if self.arena[back].left < left {
                    break;
                }
                max.pop();
            }
            max.push(outer);
        }
        max
    }

    /// Export the bracketing as a constituent tree. Terminals appear in
    /// input order; every bracket becomes an untagged non-terminal; when
    /// more than one maximal bracket exists they are joined under a top
    /// node.
    pub fn syn_tree(&self) -> SynTree {
        let mut tree = SynTree::new();
        let max = self.max_brackets();
        let mut tops = Vec::with_capacity(max.len());
        for &id in &max {
            tops.push(self.add_bracket_to_tree(id, &mut tree));
        }
        if tops.len() > 1 {
            tree.add_non_terminal("", tops);
        }
        tree
    }

    fn add_bracket_to_tree(&self, id: BracketId, tree: &mut SynTree) -> NodeId {
        let last = self.set.last_node();
        let bracket = &self.arena[id];
        let right = if bracket.right < 0 { last } else { bracket.right };

        let mut children = Vec::new();
        let mut pos = bracket.left;
        let mut dominated = bracket.dominated.iter();
        let mut next_dom = dominated.next();

        while pos <= right {
            if let Some(&&dom) = next_dom.as_ref() {
                if pos >= self.arena[dom].left {
                    children.push(self.add_bracket_to_tree(dom, tree));
                    let dom_right = self.arena[dom].right;
                    pos = if dom_right < 0 { last } else { dom_right } + 1;
                    next_dom = dominated.next();
                    continue;
                }
            }
            match self.set.unit(pos) {
                Some(unit) => children.push(tree.add_terminal(unit.name(), "", false, false)),
                None => children.push(tree.add_terminal("??", "", false, false)),
            }
            pos += 1;
        }

        tree.add_non_terminal("", children)
    }
}
