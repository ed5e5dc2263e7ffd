//! Candidate link scoring.
//!
//! A [`LinkCandidate`] is built for a pair (prefix word, last word) under
//! the depth restrictions the set currently allows in each direction. At
//! construction it matches the adjacency statistics of each word against
//! the labels of the other, derives a link strength per direction from the
//! best match, and fixes the depth the link would take. The driver then
//! compares candidates and submits the strongest to the set.

use ccl_common::Side;

use crate::label::{Label, LabelTable};
use crate::lexicon::Lexicon;
use crate::set::{CclSet, DepthSet};
use crate::stat::{CclStat, Prop, PropKind, StatSnapshot};
use crate::unit::{AdjPos, Unit};

/// The best label match between one adjacency position and the opposite
/// word.
#[derive(Debug)]
pub struct MatchResult {
    strg: f32,
    /// All labels tied at the best strength, in top-list order.
    labels: Vec<Label>,
    /// Whether the unique best label is a class label (side bit unset).
    class_match: bool,
    /// Statistics of the unique best label's word, for link derivation.
    stat_copy: Option<StatSnapshot>,
}

impl MatchResult {
    fn empty() -> MatchResult {
        MatchResult {
            strg: 0.0,
            labels: Vec::new(),
            class_match: true,
            stat_copy: None,
        }
    }
}

/// Match results over all adjacency positions of one word, and which of
/// them was best.
#[derive(Debug)]
struct AllMatch {
    /// Indexed by adjacency side, then adjacency position. `None` = not
    /// yet calculated.
    matches: [Vec<Option<MatchResult>>; 2],
    best_adj: AdjPos,
    /// Strongest match strength over all calculated positions, even where
    /// no unique label was found.
    best_strg: f32,
}

impl AllMatch {
    fn new() -> AllMatch {
        AllMatch {
            matches: [Vec::new(), Vec::new()],
            best_adj: AdjPos::new(Side::Left, -1),
            best_strg: 0.0,
        }
    }

    fn at(&self, adj: AdjPos) -> Option<&MatchResult> {
        self.matches[adj.side.index()]
            .get(adj.pos as usize)?
            .as_ref()
    }

    fn best_match_strg(&self) -> f32 {
        match self.at(self.best_adj) {
            Some(m) => m.strg,
            None => 0.0,
        }
    }

    fn best_class_match(&self) -> bool {
        self.at(self.best_adj).map_or(true, |m| m.class_match)
    }

    fn best_stat_copy(&self) -> Option<&StatSnapshot> {
        self.at(self.best_adj)?.stat_copy.as_ref()
    }
}

/// A scored candidate link between a prefix word and the last word.
///
/// Unit sides: `Left` is the prefix word, `Right` the last word. Link
/// sides are base sides: `link(Left)` is the strength of the link from the
/// prefix into the last word.
#[derive(Debug)]
pub struct LinkCandidate {
    prefix_pos: i32,
    last_pos: i32,
    allowed: [DepthSet; 2],
    matches: [AllMatch; 2],
    link: [f32; 2],
    depth: u32,
}

impl LinkCandidate {
    /// Score the pair. `prefix_depths` and `last_depths` are the depths the
    /// set allows for a link based at the prefix word and at the last word
    /// respectively.
    pub fn new(
        lexicon: &mut Lexicon,
        set: &CclSet,
        prefix_pos: i32,
        prefix_depths: DepthSet,
        last_depths: DepthSet,
        use_both_in_values: bool,
    ) -> LinkCandidate {
        debug_assert!(prefix_pos >= 0 && prefix_pos < set.last_node());
        let mut candidate = LinkCandidate {
            prefix_pos,
            last_pos: set.last_node(),
            allowed: [prefix_depths, last_depths],
            matches: [AllMatch::new(), AllMatch::new()],
            link: [0.0, 0.0],
            depth: 0,
        };
        candidate.calc_links(lexicon, set, use_both_in_values);
        candidate
    }

    /// Position of the unit on the given side (`Left` = prefix).
    pub fn pos(&self, unit_side: Side) -> i32 {
        match unit_side {
            Side::Left => self.prefix_pos,
            Side::Right => self.last_pos,
        }
    }

    pub fn depths(&self, unit_side: Side) -> DepthSet {
        self.allowed[unit_side.index()]
    }

    /// Link strength with the base on the given side.
    pub fn link(&self, base_side: Side) -> f32 {
        self.link[base_side.index()]
    }

    /// The depth both directions of this candidate would take.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The adjacency position the unit's best match used; `pos` is -1 when
    /// there was no match.
    pub fn best_adj(&self, unit_side: Side) -> AdjPos {
        self.matches[unit_side.index()].best_adj
    }

    /// Whether the best-matching adjacency position of the unit on
    /// `unit_side` has already been consumed by an earlier link.
    pub fn best_is_used(&self, set: &CclSet, unit_side: Side) -> bool {
        let unit = self.unit_at(set, unit_side);
        unit.adj_used(self.best_adj(unit_side))
    }

    pub fn best_match_strg(&self, unit_side: Side) -> f32 {
        self.matches[unit_side.index()].best_match_strg()
    }

    fn unit_at<'a>(&self, set: &'a CclSet, unit_side: Side) -> &'a Unit {
        set.unit(self.pos(unit_side)).expect("candidate positions are in the set")
    }

    /// The match between one adjacency position of the unit on `u_side`
    /// and the opposite word, calculated once and memoized.
    fn best_match(
        &mut self,
        lexicon: &mut Lexicon,
        set: &CclSet,
        u_side: Side,
        adj: AdjPos,
    ) -> f32 {
        {
            let memo = &self.matches[u_side.index()].matches[adj.side.index()];
            if let Some(Some(found)) = memo.get(adj.pos as usize) {
                return found.strg;
            }
        }

        let unit = self.unit_at(set, u_side);
        let other = self.unit_at(set, u_side.opposite());
        let result = match unit.stats_at(adj, false) {
            None => MatchResult::empty(),
            Some(stats) => calc_best_match(&stats.borrow(), adj.side, other.labels(), lexicon),
        };
        let strg = result.strg;

        let memo = &mut self.matches[u_side.index()].matches[adj.side.index()];
        if memo.len() <= adj.pos as usize {
            memo.resize_with(adj.pos as usize + 1, || None);
        }
        memo[adj.pos as usize] = Some(result);
        strg
    }

    /// Match every adjacency position of the unit on `u_side` against the
    /// other word, up to the first unused position. An unused position
    /// beats a used one; among equals the stronger match wins.
    fn all_best_matches_side(&mut self, lexicon: &mut Lexicon, set: &CclSet, u_side: Side) -> f32 {
        let adj_side = u_side.opposite();
        let mut best_pos: i32 = -1;
        let mut best_used = false;
        let mut best = 0.0f32;

        let mut adj_pos: i32 = 0;
        loop {
            let adj = AdjPos::new(adj_side, adj_pos);
            if self.unit_at(set, u_side).stats_at(adj, false).is_none() {
                break;
            }
            let used = self.unit_at(set, u_side).adj_used(adj);
            if used && best > 0.0 && !best_used {
                // an unused match is already in hand
                adj_pos += 1;
                continue;
            }

            let strg = self.best_match(lexicon, set, u_side, adj);
            let has_copy = self.matches[u_side.index()]
                .at(adj)
                .is_some_and(|m| m.stat_copy.is_some());
            if has_copy && (strg > best || (strg > 0.0 && best_used && !used)) {
                best_pos = adj_pos;
                best = strg;
                best_used = used;
            }

            if !used {
                break;
            }
            adj_pos += 1;
        }

        let all = &mut self.matches[u_side.index()];
        all.best_adj = AdjPos::new(adj_side, best_pos);
        all.best_strg = all.matches[adj_side.index()]
            .iter()
            .flatten()
            .map(|m| m.strg)
            .fold(0.0, f32::max);

        best
    }

    /// Match both units. A direction the set does not allow is only
    /// calculated when the allowed direction found nothing.
    fn all_best_matches(&mut self, lexicon: &mut Lexicon, set: &CclSet) {
        let first = if !self.allowed[Side::Left.index()].any() {
            Side::Right
        } else {
            Side::Left
        };
        let best = self.all_best_matches_side(lexicon, set, first);
        if self.allowed[first.opposite().index()].any() || best == 0.0 {
            self.all_best_matches_side(lexicon, set, first.opposite());
        }
    }

    /// Derive the two link strengths and the link depth from the stronger
    /// match.
    fn calc_links(&mut self, lexicon: &mut Lexicon, set: &CclSet, use_both_in_values: bool) {
        self.all_best_matches(lexicon, set);
        self.depth = 0;

        let strong = if self.matches[Side::Left.index()].best_match_strg()
            > self.matches[Side::Right.index()].best_match_strg()
        {
            Side::Left
        } else {
            Side::Right
        };
        let strong_strg = self.matches[strong.index()].best_match_strg();
        if strong_strg == 0.0 {
            self.link = [0.0, 0.0];
            return;
        }

        let copy = self.matches[strong.index()]
            .best_stat_copy()
            .expect("a positive best match carries statistics")
            .clone();
        let match_side = if self.matches[strong.index()].best_class_match() {
            strong
        } else {
            strong.opposite()
        };
        let other_side = match_side.opposite();

        self.link[match_side.index()] = copy
            .qt(Prop::Out, PropKind::Base, Prop::Learn, PropKind::Base)
            .min(strong_strg);

        let in_base = copy.val(Prop::In, PropKind::Base);
        let in_derived = copy.val(Prop::In, PropKind::Derived);
        self.link[other_side.index()] =
            if use_both_in_values && in_derived <= 0.0 && in_base.abs() >= in_derived.abs() {
                copy.qt(Prop::In, PropKind::Base, Prop::Learn, PropKind::Base)
            } else {
                copy.qt(Prop::In, PropKind::Derived, Prop::Learn, PropKind::Base)
            };
        self.link[other_side.index()] = self.link[other_side.index()].min(strong_strg);

        // a negative inward base value with a positive derived value marks
        // an extended (depth 1) link
        if self.link[match_side.index()] <= 0.0 && in_base < 0.0 && in_derived > 0.0 {
            self.depth = 1;
        }

        // zero-strength links fall back to the raw match between the words
        if self.link[match_side.index()] <= 0.0 && self.link[other_side.index()] <= 0.0 {
            self.link[other_side.index()] = self.matches[other_side.index()].best_match_strg();
            if self.link[match_side.index()] == 0.0 {
                self.link[match_side.index()] = self.matches[match_side.index()].best_strg;
            }
        }

        self.link[0] = self.link[0].max(0.0);
        self.link[1] = self.link[1].max(0.0);

        // remove directions the allowed depths rule out
        if !self.allowed[Side::Left.index()].allows(self.depth) {
            self.link[Side::Left.index()] = 0.0;
        }
        if !self.allowed[Side::Right.index()].allows(self.depth) {
            self.link[Side::Right.index()] = 0.0;
        }
    }
}

/// The best matching label between a statistics table and the labels of
/// the opposite word. Only labels stronger than the table's blocking
/// threshold qualify.
fn calc_best_match(
    stats: &CclStat,
    side: Side,
    labels: &LabelTable,
    lexicon: &mut Lexicon,
) -> MatchResult {
    let mut best = MatchResult::empty();

    let learn = stats.val(Prop::Learn, PropKind::Base);
    let block_ratio = stats.qt(Prop::Block, PropKind::Base, Prop::Learn, PropKind::Base);

    for (label, raw) in stats.seen_top() {
        let stat_strg = if learn != 0.0 { raw / learn } else { 0.0 };
        if stat_strg < best.strg || stat_strg <= block_ratio {
            break; // no better match below this point
        }

        let matched = stat_strg.min(labels.strength(label, side.opposite()));
        if matched == 0.0 || matched < best.strg {
            continue;
        }
        if matched == best.strg {
            best.labels.push(label.clone());
        } else {
            best.strg = matched;
            best.labels.clear();
            best.labels.push(label.clone());
        }
    }

    // a unique best label determines the statistics driving the link
    if best.labels.len() == 1 {
        let label = best.labels[0].clone();
        best.class_match = !label.is_other_side();
        let (_, entry) = lexicon.entry(label.name());
        let copy_side = if best.class_match { side } else { side.opposite() };
        let stats = entry.borrow().stats(copy_side);
        let snapshot = StatSnapshot::of(&stats.borrow());
        best.stat_copy = Some(snapshot);
    }

    best
}
