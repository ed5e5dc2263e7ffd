//! The common cover link set.
//!
//! A sorted array of nodes, one per word position, each holding its
//! outbound and inbound links per side, the farthest position reachable by
//! outbound paths (one shared cell per first-link depth), and the position
//! from which all further linking is blocked. The set enforces the four
//! addability predicates (unused adjacency, equality, forcing,
//! not-covered-to-last) and tracks the minimal resolution violation.
//!
//! Farthest-reach cells are deliberately shared: when node `j` sits at the
//! end of node `i`'s outbound chain, both point at the same cell, so
//! extending `j`'s reach extends `i`'s in constant time. A link that
//! branches off an existing chain forks the cell for the old branch first.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use ccl_common::Side;

use crate::unit::Unit;

/// One end of a link paired with the link's depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPair {
    pub end: i32,
    pub depth: u32,
}

/// The set of depths a candidate link may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthSet {
    allowed: [bool; 2],
}

impl DepthSet {
    pub fn none() -> DepthSet {
        DepthSet::default()
    }

    /// All depths from `min` up to 1; `None` allows nothing.
    pub fn from_min(min: Option<u32>) -> DepthSet {
        match min {
            Some(0) => DepthSet { allowed: [true, true] },
            Some(1) => DepthSet { allowed: [false, true] },
            _ => DepthSet::none(),
        }
    }

    pub fn allows(&self, depth: u32) -> bool {
        depth <= 1 && self.allowed[depth as usize]
    }

    pub fn deny(&mut self, depth: u32) {
        if depth <= 1 {
            self.allowed[depth as usize] = false;
        }
    }

    pub fn set(&mut self, depth: u32, allowed: bool) {
        if depth <= 1 {
            self.allowed[depth as usize] = allowed;
        }
    }

    pub fn any(&self) -> bool {
        self.allowed[0] || self.allowed[1]
    }
}

/// Link blocking at a position, seen from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    /// Depth 0 links allowed.
    Free,
    /// Only depth 1 allowed (an inbound link lies strictly in between).
    DepthOne,
    /// No link allowed (complete blocking applies).
    Full,
}

/// The unused adjacency of a node on one side: the next position a link
/// may go to, and the minimal allowed depth there (`None` when linking is
/// completely blocked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjacency {
    pub end: i32,
    pub min_depth: Option<u32>,
}

/// The minimal resolution violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rv {
    pub left_pos: i32,
    pub left_depth: u32,
}

/// Everything that can go wrong when mutating the set. A rejected link is
/// a caller bug: the driver only submits links it has verified addable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetError {
    /// The set is closed until the next word arrives.
    Closed,
    /// A link end is outside the utterance or on the wrong side of the
    /// last word.
    OutOfRange,
    /// The link violates the restrictions of the pending resolution
    /// violation.
    RvRestricted,
    UnusedAdjacency,
    Equality,
    Forcing,
    NotCoveredToLast,
    /// A word may not be added while a resolution violation is pending.
    RvPending,
}

impl fmt::Display for SetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SetError::Closed => "link added to a closed set",
            SetError::OutOfRange => "link end out of range",
            SetError::RvRestricted => "link not allowed under the pending resolution violation",
            SetError::UnusedAdjacency => "unused adjacency predicate failed",
            SetError::Equality => "equality predicate failed",
            SetError::Forcing => "forcing predicate failed",
            SetError::NotCoveredToLast => "link ends are already covered to the last word",
            SetError::RvPending => "cannot advance while a resolution violation is pending",
        };
        f.write_str(s)
    }
}

impl std::error::Error for SetError {}

type ReachCell = Rc<Cell<i32>>;

#[derive(Debug)]
struct NodeSide {
    /// Outbound links in insertion order; heads are strictly monotone away
    /// from the node.
    outbound: Vec<LinkPair>,
    /// Head of the latest depth-0 outbound link; the node's own position
    /// if there is none.
    last_outbound0: i32,
    inbound: Option<LinkPair>,
    /// `paths[d]` is the farthest position reachable by a path whose first
    /// link has depth `d`. Cells may be shared with downstream nodes.
    paths: Vec<ReachCell>,
    /// First position at which complete blocking applies; -1 for none.
    complete_block: ReachCell,
}

#[derive(Debug)]
struct Node {
    pos: i32,
    sides: [NodeSide; 2],
}

impl Node {
    fn new(pos: i32) -> Node {
        let side = || NodeSide {
            outbound: Vec::new(),
            last_outbound0: pos,
            inbound: None,
            paths: vec![Rc::new(Cell::new(pos))],
            complete_block: Rc::new(Cell::new(-1)),
        };
        Node {
            pos,
            sides: [side(), side()],
        }
    }

    fn side(&self, side: Side) -> &NodeSide {
        &self.sides[side.index()]
    }

    fn side_mut(&mut self, side: Side) -> &mut NodeSide {
        &mut self.sides[side.index()]
    }

    fn inbound(&self, side: Side) -> Option<LinkPair> {
        self.side(side).inbound
    }

    fn last_outbound(&self, side: Side) -> Option<LinkPair> {
        self.side(side).outbound.last().copied()
    }

    /// Farthest position reachable on `side` over any first depth.
    fn longest_path(&self, side: Side) -> i32 {
        self.side(side).paths.last().expect("paths never empty").get()
    }

    /// Farthest position reachable on `side` by a path whose first link
    /// has the given depth; the node's own position if there is none.
    fn longest_path_at(&self, side: Side, first_depth: u32) -> i32 {
        match self.side(side).paths.get(first_depth as usize) {
            Some(cell) => cell.get(),
            None => self.pos,
        }
    }

    fn has_path_to(&self, pos: i32) -> bool {
        if pos == self.pos {
            return true;
        }
        if pos < self.pos {
            self.longest_path(Side::Left) <= pos
        } else {
            self.longest_path(Side::Right) >= pos
        }
    }

    /// Depth of the first link on a path to `head`; `None` if unreachable.
    fn path_first_depth(&self, head: i32) -> Option<u32> {
        if head == self.pos {
            return None;
        }
        let side = Side::of(head, self.pos);
        for (d, cell) in self.side(side).paths.iter().enumerate() {
            let reach = cell.get();
            let reached = match side {
                Side::Left => reach <= head,
                Side::Right => reach >= head,
            };
            if reached {
                return Some(d as u32);
            }
        }
        None
    }

    /// The blocking that applies at `pos`, as seen from this node.
    fn blocking(&self, pos: i32) -> Blocking {
        let side = if pos < self.pos { Side::Left } else { Side::Right };
        let mut blocking = Blocking::Free;

        if let Some(inbound) = self.inbound(side) {
            let in_between = match side {
                Side::Left => inbound.end > pos,
                Side::Right => inbound.end < pos,
            };
            if in_between {
                blocking = Blocking::DepthOne;
            }
            let complete = self.side(side).complete_block.get();
            if complete >= 0 {
                let beyond = match side {
                    Side::Left => complete > pos,
                    Side::Right => complete < pos,
                };
                if beyond {
                    blocking = Blocking::Full;
                }
            }
        }

        blocking
    }

    /// The next position a link from this node on `side` may go to, with
    /// the minimal allowed depth there.
    fn unused_adj(&self, side: Side) -> Adjacency {
        let end = self.longest_path(side) + if side == Side::Left { -1 } else { 1 };
        let link_depth = self.last_outbound(side).map_or(0, |lp| lp.depth);
        let min_depth = match self.blocking(end) {
            Blocking::Full => None,
            Blocking::DepthOne => Some(link_depth.max(1)),
            Blocking::Free => Some(link_depth),
        };
        Adjacency { end, min_depth }
    }
}

/// The common cover link set over one utterance, together with the units
/// at its positions.
#[derive(Debug, Default)]
pub struct CclSet {
    nodes: Vec<Node>,
    units: Vec<Unit>,
    rv: Option<Rv>,
    /// Prefix positions with an unused adjacency toward the last word,
    /// ordered by increasing distance from it.
    prefix_adj: Vec<LinkPair>,
    closed: bool,
}

impl CclSet {
    pub fn new() -> CclSet {
        CclSet {
            closed: true, // no links until the first word arrives
            ..CclSet::default()
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.units.clear();
        self.rv = None;
        self.prefix_adj.clear();
        self.closed = true;
    }

    /// Position of the last node; -1 when the set is empty.
    pub fn last_node(&self) -> i32 {
        self.nodes.len() as i32 - 1
    }

    pub fn unit(&self, pos: i32) -> Option<&Unit> {
        if pos < 0 {
            return None;
        }
        self.units.get(pos as usize)
    }

    pub fn last_unit(&self) -> Option<&Unit> {
        self.units.last()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    // ── Addability predicates ──────────────────────────────────────────

    pub fn unused_adjacency(&self, base: i32, head: i32, depth: u32) -> bool {
        if head == base || depth > 1 {
            return false;
        }
        if head > self.last_node() || base > self.last_node() || head < 0 || base < 0 {
            return false;
        }
        let unused = self.nodes[base as usize].unused_adj(Side::of(head, base));
        unused.end == head && unused.min_depth.is_some_and(|d| d <= depth)
    }

    pub fn equality(&self, base: i32, head: i32, depth: u32) -> bool {
        if head == base || head > self.last_node() || base > self.last_node() {
            return false;
        }

        // the first link on the path from the head back toward the base
        // must have the candidate depth
        if let Some(op_depth) = self.nodes[head as usize].path_first_depth(base) {
            if op_depth != depth {
                return false;
            }
        }

        // an inbound link into the base from beyond the head, reachable
        // from the head, must have the candidate depth
        let side = Side::of(head, base);
        if let Some(inbound) = self.nodes[base as usize].inbound(side) {
            let beyond = match side {
                Side::Left => inbound.end <= head,
                Side::Right => inbound.end >= head,
            };
            if beyond && self.nodes[head as usize].has_path_to(inbound.end) {
                return inbound.depth == depth;
            }
        }

        true
    }

    /// No existing link to or from the last word may begin left of `base`.
    pub fn not_covered_to_last(&self, base: i32) -> bool {
        let Some(last) = self.nodes.last() else {
            return false;
        };
        let inbound_end = last.inbound(Side::Left).map_or(last.pos, |lp| lp.end);
        if inbound_end < base {
            return false;
        }
        let outbound_end = last.last_outbound(Side::Left).map_or(last.pos, |lp| lp.end);
        if outbound_end < base {
            return false;
        }
        true
    }

    pub fn forcing(&self, base: i32, head: i32, depth: u32) -> bool {
        let side = Side::of(head, base);
        match self.nodes[base as usize].inbound(side) {
            None => true,
            Some(inbound) => {
                let nearer = match side {
                    Side::Left => inbound.end > head,
                    Side::Right => inbound.end < head,
                };
                nearer || inbound.depth < 1 || depth == 1
            }
        }
    }

    // ── Resolution violation ───────────────────────────────────────────

    pub fn has_rv(&self) -> bool {
        self.rv.is_some()
    }

    pub fn rv(&self) -> Option<Rv> {
        self.rv
    }

    pub fn min_rv_left_pos(&self) -> i32 {
        self.rv.map_or(-1, |rv| rv.left_pos)
    }

    pub fn left_rv_depth(&self) -> Option<u32> {
        self.rv.map(|rv| rv.left_depth)
    }

    /// The depth required on the right side of the violation: the depth of
    /// the last word's latest leftward link.
    pub fn right_rv_depth(&self) -> Option<u32> {
        if !self.has_rv() {
            return None;
        }
        self.nodes
            .last()
            .and_then(|n| n.last_outbound(Side::Left))
            .map(|lp| lp.depth)
    }

    fn update_rv(&mut self, base: i32, head: i32, _depth: u32) {
        if base < head {
            // a link from the prefix to the last word cannot create a
            // violation; if one was pending, this link repaired it
            self.rv = None;
            return;
        }

        // a link from the last word into the prefix
        let longest = self.nodes[head as usize].longest_path(Side::Left);
        if self.rv.is_none_or(|rv| longest <= rv.left_pos) {
            self.rv = None;
        }

        // the farthest-left reachable node may expose a new violation
        let last = self.last_node();
        if let Some(violation) = self.nodes[longest as usize].inbound(Side::Left) {
            if violation.end < longest
                && self.nodes[violation.end as usize].path_first_depth(last).is_none()
            {
                let minimal = match self.rv {
                    None => true,
                    Some(rv) => {
                        violation.end > rv.left_pos
                            || (violation.end == rv.left_pos && violation.depth < rv.left_depth)
                    }
                };
                if minimal {
                    self.rv = Some(Rv {
                        left_pos: violation.end,
                        left_depth: violation.depth,
                    });
                }
            }
        }
    }

    // ── Advancing ──────────────────────────────────────────────────────

    pub fn can_advance(&self) -> bool {
        !self.has_rv()
    }

    /// Append the next word's node. Fails while a resolution violation is
    /// pending.
    pub fn advance(&mut self, unit: Unit) -> Result<(), SetError> {
        if !self.can_advance() {
            return Err(SetError::RvPending);
        }
        self.update_prefix_adj();
        let pos = self.nodes.len() as i32;
        self.nodes.push(Node::new(pos));
        self.units.push(unit);
        self.closed = false;
        Ok(())
    }

    /// Freeze the set until the next word arrives.
    pub fn close(&mut self) -> Result<(), SetError> {
        if !self.can_advance() {
            return Err(SetError::RvPending);
        }
        self.closed = true;
        Ok(())
    }

    fn update_prefix_adj(&mut self) {
        if self.nodes.is_empty() {
            self.prefix_adj.clear();
            return;
        }

        match self.nodes.last().expect("nonempty").inbound(Side::Left) {
            None => self.prefix_adj.clear(),
            Some(inbound) => {
                // positions beyond the word attached to the last word can
                // no longer be attached without crossing
                let connected = inbound.end;
                while self.prefix_adj.first().is_some_and(|e| e.end > connected) {
                    self.prefix_adj.remove(0);
                }

                let mut i = 0;
                while i < self.prefix_adj.len() {
                    let end = self.prefix_adj[i].end;
                    let refreshed = self.nodes[end as usize].unused_adj(Side::Right);
                    match refreshed.min_depth {
                        Some(d) if d == self.prefix_adj[i].depth => {
                            // unchanged; nodes not attached to the last
                            // word cannot have changed further down either
                            if end != connected {
                                break;
                            }
                            i += 1;
                        }
                        Some(d) if d <= 1 => {
                            self.prefix_adj[i].depth = d;
                            i += 1;
                        }
                        _ => {
                            self.prefix_adj.remove(i);
                        }
                    }
                }
            }
        }

        // the last word itself is always adjacent with depth 0
        let last = self.last_node();
        self.prefix_adj.insert(0, LinkPair { end: last, depth: 0 });
    }

    // ── Link insertion ─────────────────────────────────────────────────

    /// Add a link after verifying every addability predicate and the
    /// resolution-violation restrictions.
    pub fn add_link(&mut self, base: i32, head: i32, depth: u32) -> Result<(), SetError> {
        if self.closed {
            return Err(SetError::Closed);
        }
        let last = self.last_node();

        if base == last {
            if head >= last || head < 0 {
                return Err(SetError::OutOfRange);
            }
            if self.has_rv()
                && (head < self.min_rv_left_pos()
                    || self.right_rv_depth() != Some(depth))
            {
                return Err(SetError::RvRestricted);
            }
            if !self.unused_adjacency(base, head, depth) {
                return Err(SetError::UnusedAdjacency);
            }
            if !self.equality(base, head, depth) {
                return Err(SetError::Equality);
            }
            if !self.forcing(base, head, depth) {
                return Err(SetError::Forcing);
            }
        } else if head == last {
            if base >= last || base < 0 {
                return Err(SetError::OutOfRange);
            }
            if self.has_rv()
                && (base < self.min_rv_left_pos()
                    || (base == self.min_rv_left_pos()
                        && self.left_rv_depth() != Some(depth)))
            {
                return Err(SetError::RvRestricted);
            }
            // forcing needs no check here: its only possible violation is
            // also an equality violation
            if !self.unused_adjacency(base, head, depth) {
                return Err(SetError::UnusedAdjacency);
            }
            if !self.not_covered_to_last(base) {
                return Err(SetError::NotCoveredToLast);
            }
            if !self.equality(base, head, depth) {
                return Err(SetError::Equality);
            }
        } else {
            return Err(SetError::OutOfRange);
        }

        if base < head {
            self.link_at_prefix_base(base, head, depth);
            self.link_at_last_word_head(head, base, depth);
        } else {
            self.link_at_last_word_base(base, head, depth);
            self.link_at_prefix_head(head, base, depth);
        }

        self.update_rv(base, head, depth);
        Ok(())
    }

    /// Base at the last word, linking leftward.
    fn link_at_last_word_base(&mut self, base: i32, head: i32, depth: u32) {
        let head_reach = self.nodes[head as usize]
            .side(Side::Left)
            .paths
            .last()
            .expect("paths never empty")
            .clone();

        let node = &mut self.nodes[base as usize];
        let side = node.side_mut(Side::Left);
        side.outbound.push(LinkPair { end: head, depth });
        if depth == 0 {
            side.last_outbound0 = head;
        }
        while side.paths.len() <= depth as usize {
            let repeat = side.paths.last().expect("paths never empty").clone();
            side.paths.push(repeat);
        }
        // adopt the head's farthest-left cell: the last word now reaches
        // wherever the head reaches
        side.paths[depth as usize] = head_reach;

        if depth == 1 {
            self.set_complete_right_blocking(base as usize, base);
        }
    }

    /// Head in the prefix receiving an inbound link from the last word.
    fn link_at_prefix_head(&mut self, head: i32, base: i32, depth: u32) {
        let side = self.nodes[head as usize].side_mut(Side::Right);
        debug_assert!(side.inbound.is_none(), "second inbound link on one side");
        side.inbound = Some(LinkPair { end: base, depth });
    }

    /// Base in the prefix, linking rightward into the last word.
    fn link_at_prefix_base(&mut self, base: i32, head: i32, depth: u32) {
        // the old rightward chain keeps the current reach in a cell of its
        // own; this link will move the base's reach to the last word
        if let Some(old_chain) = self.nodes[base as usize].last_outbound(Side::Right) {
            let frozen = Rc::new(Cell::new(self.nodes[base as usize].longest_path(Side::Right)));
            self.rebind_right_reach(old_chain.end as usize, frozen);
        }

        let node = &mut self.nodes[base as usize];
        let side = node.side_mut(Side::Right);
        side.outbound.push(LinkPair { end: head, depth });
        if depth == 0 {
            side.last_outbound0 = head;
        }
        if side.paths.len() <= depth as usize {
            // first depth-1 link on this side: the depth-0 cell is the one
            // shared with other nodes, so it becomes the overall-reach
            // cell and depth 0 gets a fresh copy
            let shared = side.paths[0].clone();
            side.paths.push(shared);
            side.paths[0] = Rc::new(Cell::new(side.paths[1].get()));
        }
        side.paths[depth as usize].set(head);

        if depth == 1 {
            self.set_complete_right_blocking(base as usize, base);
        }
    }

    /// The last word receiving an inbound link from the prefix.
    fn link_at_last_word_head(&mut self, head: i32, base: i32, depth: u32) {
        let base_cell = self.nodes[base as usize].side(Side::Right).paths[depth as usize].clone();
        let base_left_block = self.nodes[base as usize]
            .side(Side::Left)
            .complete_block
            .get();

        let node = &mut self.nodes[head as usize];
        debug_assert!(
            node.side(Side::Left).inbound.is_none(),
            "second inbound link on one side"
        );
        node.side_mut(Side::Left).inbound = Some(LinkPair { end: base, depth });

        // share the base's reach cell and extend it to the last word
        node.side_mut(Side::Right).paths[0] = base_cell;
        node.side(Side::Right).paths[0].set(head);

        let block = if depth == 1 { base } else { base_left_block };
        node.side(Side::Left).complete_block.set(block);
    }

    /// Record `pos` as the complete blocking position on the right side of
    /// `start` and every node reachable from it leftward, stopping at
    /// nodes that already carry an earlier value.
    fn set_complete_right_blocking(&mut self, start: usize, pos: i32) {
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            if node.side(Side::Right).complete_block.get() >= 0 {
                continue;
            }
            if pos != node.pos {
                node.side(Side::Right).complete_block.set(pos);
            }
            for lp in &node.side(Side::Left).outbound {
                stack.push(lp.end as usize);
            }
        }
    }

    /// Replace the overall rightward-reach cell along the outbound-right
    /// spine starting at `start`.
    fn rebind_right_reach(&mut self, start: usize, cell: ReachCell) {
        let mut current = start;
        loop {
            let node = &mut self.nodes[current];
            let side = node.side_mut(Side::Right);
            *side.paths.last_mut().expect("paths never empty") = cell.clone();
            match side.outbound.last() {
                Some(lp) => current = lp.end as usize,
                None => break,
            }
        }
    }

    // ── Read access ────────────────────────────────────────────────────

    pub fn inbound(&self, node: i32, side: Side) -> Option<LinkPair> {
        self.nodes.get(node as usize)?.inbound(side)
    }

    pub fn last_outbound(&self, node: i32, side: Side) -> Option<LinkPair> {
        self.nodes.get(node as usize)?.last_outbound(side)
    }

    /// Head of the latest depth-0 outbound link; the node's own position
    /// if there is none.
    pub fn last_outbound0(&self, node: i32, side: Side) -> i32 {
        self.nodes[node as usize].side(side).last_outbound0
    }

    pub fn outbound(&self, node: i32, side: Side) -> &[LinkPair] {
        &self.nodes[node as usize].side(side).outbound
    }

    pub fn outbound_num(&self, node: i32, side: Side) -> usize {
        self.nodes[node as usize].side(side).outbound.len()
    }

    pub fn longest_path(&self, node: i32, side: Side) -> i32 {
        match self.nodes.get(node as usize) {
            Some(n) => n.longest_path(side),
            None => node,
        }
    }

    pub fn longest_path_at(&self, node: i32, side: Side, first_depth: u32) -> i32 {
        match self.nodes.get(node as usize) {
            Some(n) => n.longest_path_at(side, first_depth),
            None => node,
        }
    }

    pub fn unused_adj(&self, node: i32, side: Side) -> Adjacency {
        match self.nodes.get(node as usize) {
            Some(n) => n.unused_adj(side),
            None => Adjacency { end: -1, min_depth: None },
        }
    }

    pub fn has_path(&self, node: i32, target: i32) -> bool {
        self.nodes
            .get(node as usize)
            .is_some_and(|n| n.has_path_to(target))
    }

    // ── Addable links ──────────────────────────────────────────────────

    /// The addable link whose base is the last word: the head position of
    /// the next unused adjacency on its left, and the depths allowed there
    /// under equality, forcing and the resolution violation.
    pub fn last_addable(&self) -> (i32, DepthSet) {
        let Some(last) = self.nodes.last() else {
            return (-1, DepthSet::none());
        };

        let unused = last.unused_adj(Side::Left);
        let mut depths = DepthSet::none();
        depths.set(0, unused.min_depth == Some(0) && unused.end >= 0);
        depths.set(1, unused.min_depth.is_some() && unused.end >= 0);
        if !depths.any() {
            return (unused.end, depths);
        }

        let inbound = last.inbound(Side::Left);

        // forcing: a depth-1 inbound link rules depth 0 out
        if inbound.map_or(false, |i| i.depth == 1) {
            depths.deny(0);
        }

        // equality against the path from the head back to the last word
        if let Some(op_depth) = self.nodes[unused.end as usize].path_first_depth(self.last_node())
        {
            depths.deny(1 - op_depth);
        }

        // equality against an opposite inbound link the new link would
        // close a path to
        if let Some(inbound) = inbound {
            if inbound.depth <= 1 && self.nodes[unused.end as usize].has_path_to(inbound.end) {
                depths.deny(1 - inbound.depth);
            }
        }

        if let Some(rv_depth) = self.right_rv_depth() {
            depths.deny(1 - rv_depth);
        }

        (unused.end, depths)
    }

    /// Iterator over the incrementally addable links from the prefix to
    /// the last word. Must be rebuilt after every added link.
    pub fn prefix_addable(&self) -> PrefixAddableIter<'_> {
        PrefixAddableIter::new(self)
    }
}

/// Lazy enumeration of the prefix positions that may still link to the
/// last word, with the depths allowed for each. Ordered by increasing
/// distance from the last word.
pub struct PrefixAddableIter<'a> {
    set: &'a CclSet,
    idx: usize,
    depths: DepthSet,
    empty: bool,
}

impl<'a> PrefixAddableIter<'a> {
    fn new(set: &'a CclSet) -> PrefixAddableIter<'a> {
        let last = set.nodes.last();
        // once the last word has an inbound link, nothing further from the
        // prefix may attach
        let empty = match last {
            None => true,
            Some(node) => node.inbound(Side::Left).is_some(),
        };
        let mut iter = PrefixAddableIter {
            set,
            idx: 0,
            depths: DepthSet::none(),
            empty,
        };
        if iter.empty {
            return iter;
        }

        // positions beyond the last word's own leftward links are covered
        let covered = last
            .expect("nonempty")
            .last_outbound(Side::Left)
            .map_or(set.last_node(), |lp| lp.end);
        while iter.idx < set.prefix_adj.len() && set.prefix_adj[iter.idx].end > covered {
            iter.idx += 1;
        }

        iter.calc_depths();
        iter.empty = iter.at_end();
        iter
    }

    pub fn at_end(&self) -> bool {
        if self.empty || self.idx >= self.set.prefix_adj.len() {
            return true;
        }
        // under a resolution violation, bases left of the violation are
        // not addable
        self.set.has_rv() && self.set.prefix_adj[self.idx].end < self.set.min_rv_left_pos()
    }

    /// Base position of the current addable link.
    pub fn base(&self) -> Option<i32> {
        if self.at_end() {
            None
        } else {
            Some(self.set.prefix_adj[self.idx].end)
        }
    }

    pub fn depths(&self) -> DepthSet {
        self.depths
    }

    pub fn advance(&mut self) -> bool {
        if self.at_end() {
            return false;
        }
        self.idx += 1;
        self.calc_depths();
        !self.at_end()
    }

    /// Compute the allowed depths at the current position, skipping
    /// positions that allow nothing.
    fn calc_depths(&mut self) {
        self.depths = DepthSet::none();
        loop {
            if self.at_end() {
                return;
            }
            let entry = self.set.prefix_adj[self.idx];
            self.depths.set(0, entry.depth == 0);
            self.depths.set(1, true);

            let last_node = self.set.nodes.last().expect("nonempty");
            if let Some(op_depth) = last_node.path_first_depth(entry.end) {
                self.depths.deny(1 - op_depth);
            }

            if self.set.has_rv() && entry.end == self.set.min_rv_left_pos() {
                if let Some(d) = self.set.left_rv_depth() {
                    self.depths.deny(1 - d);
                }
            }

            if self.depths.any() {
                return;
            }
            self.idx += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::CclStat;
    use std::rc::Rc;

    fn test_unit(name: &str) -> Unit {
        let key: Rc<str> = Rc::from(name);
        Unit::new(
            key.clone(),
            &[key],
            [CclStat::new_shared(10), CclStat::new_shared(10)],
            10,
        )
    }

    fn set_with(n: usize) -> CclSet {
        let mut set = CclSet::new();
        for i in 0..n {
            set.advance(test_unit(&format!("w{i}"))).unwrap();
        }
        set
    }

    #[test]
    fn empty_set_has_no_last_node() {
        let set = CclSet::new();
        assert_eq!(set.last_node(), -1);
        assert!(!set.has_rv());
    }

    #[test]
    fn direct_adjacency_link_both_ways() {
        let mut set = set_with(2);
        // last word leftward
        set.add_link(1, 0, 0).unwrap();
        assert_eq!(set.outbound(1, Side::Left), &[LinkPair { end: 0, depth: 0 }]);
        assert_eq!(set.inbound(0, Side::Right), Some(LinkPair { end: 1, depth: 0 }));
        // prefix rightward
        set.add_link(0, 1, 0).unwrap();
        assert_eq!(set.outbound(0, Side::Right), &[LinkPair { end: 1, depth: 0 }]);
        assert_eq!(set.inbound(1, Side::Left), Some(LinkPair { end: 0, depth: 0 }));
    }

    #[test]
    fn paths_share_cells_along_chains() {
        let mut set = set_with(2);
        set.add_link(1, 0, 0).unwrap();
        assert_eq!(set.longest_path(1, Side::Left), 0);

        set.advance(test_unit("w2")).unwrap();
        set.add_link(2, 1, 0).unwrap();
        // x2 adopts x1's farthest-left cell, which reaches 0
        assert_eq!(set.longest_path(2, Side::Left), 0);
        // ...so the only unused adjacency of x2 is beyond the utterance
        assert_eq!(set.unused_adj(2, Side::Left).end, -1);
    }

    #[test]
    fn rightward_chain_extends_shared_reach() {
        let mut set = set_with(2);
        set.add_link(0, 1, 0).unwrap();
        set.advance(test_unit("w2")).unwrap();
        set.add_link(1, 2, 0).unwrap();
        // extending x1 extends x0 through the shared cell
        assert_eq!(set.longest_path(0, Side::Right), 2);
        assert_eq!(set.longest_path(1, Side::Right), 2);
    }

    #[test]
    fn adjacency_rejects_skipping() {
        let mut set = set_with(3);
        // x2 -> x0 skips x1, whose adjacency is still unused
        assert!(!set.unused_adjacency(2, 0, 0));
        assert_eq!(
            set.add_link(2, 0, 0).unwrap_err(),
            SetError::UnusedAdjacency
        );
    }

    #[test]
    fn forcing_after_depth_one_inbound() {
        let mut set = set_with(2);
        set.add_link(0, 1, 1).unwrap();
        set.advance(test_unit("w2")).unwrap();
        // x1 has a depth-1 inbound on its left, so x1 -> x0 must have
        // depth 1... but here forcing is observed on the last-addable set
        // of the new last word x2: x2 -> x1 is unrestricted
        let (head, depths) = set.last_addable();
        assert_eq!(head, 1);
        assert!(depths.allows(0));
        assert!(depths.allows(1));
        assert!(set.forcing(2, 1, 0));
    }

    #[test]
    fn forcing_blocks_depth_zero_from_forced_base() {
        let mut set = set_with(2);
        set.add_link(0, 1, 1).unwrap();
        // the last word x1 now has a depth-1 inbound on the LEFT: a
        // leftward link from x1 is forced to depth 1
        assert!(!set.forcing(1, 0, 0));
        assert!(set.forcing(1, 0, 1));
        let (head, depths) = set.last_addable();
        assert_eq!(head, 0);
        assert!(!depths.allows(0));
        assert!(depths.allows(1));
        // equality fails before forcing is even consulted: the roundtrip
        // path from x0 to x1 has first depth 1
        assert!(set.add_link(1, 0, 0).is_err());
        set.add_link(1, 0, 1).unwrap();
    }

    #[test]
    fn equality_matches_roundtrip_depth() {
        let mut set = set_with(2);
        set.add_link(1, 0, 0).unwrap();
        // the path from x0 back toward x1 does not exist yet, but the
        // inbound on x0's right from x1 does: x0 -> x1 must take depth 0
        assert!(set.equality(0, 1, 0));
        assert!(!set.equality(0, 1, 1));
    }

    /// x0 x1 x2 with x0 -> x1 and x2 -> x1. The farthest-left reach of x2
    /// is x1, and x1 has an inbound link from x0 which cannot reach x2:
    /// the minimal resolution violation is (0, 0).
    fn rv_setup() -> CclSet {
        let mut set = set_with(2);
        set.add_link(0, 1, 0).unwrap();
        set.advance(test_unit("w2")).unwrap();
        set.add_link(2, 1, 0).unwrap();
        set
    }

    #[test]
    fn rv_created_and_repaired() {
        let mut set = rv_setup();
        assert!(set.has_rv());
        assert_eq!(set.rv(), Some(Rv { left_pos: 0, left_depth: 0 }));
        assert!(set.advance(test_unit("w3")).is_err());

        // the repair link x2 -> x0 must be accepted and clear the violation
        set.add_link(2, 0, 0).unwrap();
        assert!(!set.has_rv());
        assert!(set.advance(test_unit("w3")).is_ok());
    }

    #[test]
    fn rv_restricts_last_links() {
        let mut set = rv_setup();
        // depth 1 does not match the required rightward depth (0)
        assert_eq!(set.add_link(2, 0, 1).unwrap_err(), SetError::RvRestricted);
    }

    #[test]
    fn outbound_heads_monotone() {
        let mut set = rv_setup();
        set.add_link(2, 0, 0).unwrap();
        for node in 0..=set.last_node() {
            let left = set.outbound(node, Side::Left);
            assert!(left.windows(2).all(|w| w[1].end < w[0].end));
            let right = set.outbound(node, Side::Right);
            assert!(right.windows(2).all(|w| w[1].end > w[0].end));
        }
        // x2 ended with two leftward links
        assert_eq!(set.outbound(2, Side::Left).len(), 2);
    }

    #[test]
    fn complete_blocking_is_not_overwritten() {
        let mut set = set_with(2);
        set.add_link(0, 1, 1).unwrap();
        set.add_link(1, 0, 1).unwrap();
        set.advance(test_unit("w2")).unwrap();
        // complete blocking on x0's right was set to 0 by the depth-1
        // leftward link; it must keep the earlier value now
        let before = set.nodes[0].side(Side::Right).complete_block.get();
        set.set_complete_right_blocking(0, 5);
        assert_eq!(set.nodes[0].side(Side::Right).complete_block.get(), before);
    }

    #[test]
    fn closed_set_rejects_links() {
        let mut set = set_with(2);
        set.close().unwrap();
        assert_eq!(set.add_link(1, 0, 0).unwrap_err(), SetError::Closed);
    }

    #[test]
    fn prefix_iter_empty_once_last_has_inbound() {
        let mut set = set_with(2);
        set.advance(test_unit("w2")).unwrap();
        {
            let iter = set.prefix_addable();
            assert!(!iter.at_end());
            assert_eq!(iter.base(), Some(1));
        }
        set.add_link(1, 2, 0).unwrap();
        let iter = set.prefix_addable();
        assert!(iter.at_end());
    }

    #[test]
    fn prefix_iter_orders_by_distance() {
        let mut set = set_with(2);
        set.add_link(0, 1, 0).unwrap();
        set.add_link(1, 0, 0).unwrap();
        set.advance(test_unit("w2")).unwrap();
        let mut iter = set.prefix_addable();
        let mut bases = Vec::new();
        while let Some(base) = iter.base() {
            bases.push(base);
            iter.advance();
        }
        // x1 first (directly adjacent), then x0 (reachable via x1's chain)
        assert_eq!(bases, vec![1, 0]);
    }

    #[test]
    fn last_addable_walks_left_reach() {
        let mut set = set_with(2);
        set.add_link(1, 0, 0).unwrap();
        set.advance(test_unit("w2")).unwrap();
        let (head, depths) = set.last_addable();
        assert_eq!(head, 1);
        assert!(depths.any());
        set.add_link(2, 1, 0).unwrap();
        // x2 now reaches 0 through x1's cell
        let (head, _) = set.last_addable();
        assert_eq!(head, -1);
    }
}
