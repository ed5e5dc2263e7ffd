//! The parse driver.
//!
//! Words and punctuation arrive one at a time. For every word the driver
//! advances the bracketed set, scores the candidate links between the new
//! word and the prefix, adds the strongest until no candidate has positive
//! strength and no resolution violation remains, and queues the word's
//! learning events. End-of-utterance punctuation closes the set, adds the
//! final right-side learning events and realizes the queue.

use std::fmt;
use std::fmt::Write as _;

use ccl_common::{Config, PunctKind, Side, SynTree, Trace, TraceBits};

use crate::brackets::CclBrackets;
use crate::learn::{LearnEvent, LearnQueue};
use crate::lexicon::Lexicon;
use crate::link::LinkCandidate;
use crate::set::{CclSet, DepthSet, SetError};
use crate::unit::{AdjPos, Unit};

/// Errors surfaced by the driver. Structural violations are driver bugs:
/// the driver never submits a link it has not verified addable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Set(SetError),
    /// A selected candidate could not be added at any allowed depth.
    LinkRejected,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Set(err) => write!(f, "link set violation: {err}"),
            ParseError::LinkRejected => f.write_str("selected candidate link was rejected"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<SetError> for ParseError {
    fn from(err: SetError) -> ParseError {
        ParseError::Set(err)
    }
}

/// Which candidate the comparators selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chosen {
    Prefix(usize),
    Last,
}

/// The incremental CCL parser. Owns the lexicon, which persists across
/// utterances and passes; per-utterance state is dropped at every
/// end-of-utterance.
pub struct CclParser {
    config: Config,
    lexicon: Lexicon,
    brackets: CclBrackets,
    queue: LearnQueue,
    learn_cycle: bool,
    parse_cycle: bool,
    trace: Trace,
    utterance_done: bool,
}

impl CclParser {
    pub fn new(config: Config, trace: Trace) -> CclParser {
        let lexicon = Lexicon::new(config.statistics_top_list_max_len as usize);
        CclParser {
            config,
            lexicon,
            brackets: CclBrackets::new(),
            queue: LearnQueue::new(),
            learn_cycle: false,
            parse_cycle: false,
            trace,
            utterance_done: false,
        }
    }

    pub fn set_learn_cycle(&mut self, learn: bool) {
        self.learn_cycle = learn;
    }

    pub fn set_parse_cycle(&mut self, parse: bool) {
        self.parse_cycle = parse;
    }

    pub fn is_parse_cycle(&self) -> bool {
        self.parse_cycle
    }

    /// Replace the configuration (per-corpus overrides between passes).
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn brackets(&self) -> &CclBrackets {
        &self.brackets
    }

    /// The constituent tree of the current (finished) utterance.
    pub fn syn_tree(&self) -> SynTree {
        self.brackets.syn_tree()
    }

    /// Drop all per-utterance state. The lexicon survives.
    pub fn clear_utterance(&mut self) {
        self.brackets.clear();
        self.queue.clear();
        self.utterance_done = false;
    }

    /// Abort the current utterance: queued learning events are discarded,
    /// not realized.
    pub fn abort_utterance(&mut self) {
        self.queue.clear();
        self.brackets.clear();
        self.utterance_done = false;
    }

    /// Feed the next word.
    pub fn unit(&mut self, name: &str, labels: &[String]) -> Result<(), ParseError> {
        if self.utterance_done {
            self.clear_utterance();
        }
        let unit = self.create_unit(name, labels);

        // stopping punctuation recorded on the previous word carries over
        // to the left side of this one
        if let Some(prev) = self.brackets.set().last_unit() {
            unit.set_stop_punct(Side::Left, prev.stop_punct(Side::Right));
        }

        self.brackets.advance(unit)?;
        self.parse()
    }

    /// Feed the next punctuation mark.
    pub fn punct(&mut self, kind: PunctKind) -> Result<(), ParseError> {
        if self.config.use_stopping_punct && kind.is_stopping() {
            if let Some(last) = self.brackets.set().last_unit() {
                last.set_stop_punct(Side::Right, Some(kind));
            }
        }

        // any punctuation freezes the bracketing of the last word
        self.brackets.close_utterance()?;

        if kind.is_end_of_utterance() {
            self.terminate();
        }
        Ok(())
    }

    fn terminate(&mut self) {
        if self.learn_cycle {
            // right-side learning at the utterance boundary
            self.learn_right(self.brackets.set().last_node() + 1);
            self.queue.realize(self.brackets.set());
        } else {
            self.queue.clear();
        }
        self.utterance_done = true;
    }

    fn create_unit(&mut self, name: &str, labels: &[String]) -> Unit {
        let lowered = name.to_lowercase();
        let (key, entry) = self.lexicon.entry(&lowered);
        if self.learn_cycle {
            entry.borrow_mut().count += 1;
        }

        // the word itself is always its first label
        let mut unit_labels = vec![key.clone()];
        for label in labels {
            let lowered_label = label.to_lowercase();
            if lowered_label.is_empty() || lowered_label == lowered {
                continue;
            }
            unit_labels.push(self.lexicon.intern(&lowered_label));
        }

        let stats = entry.borrow().stats_pair();
        Unit::new(key, &unit_labels, stats, self.config.max_labels as usize)
    }

    // ── Parsing ────────────────────────────────────────────────────────

    /// All parsing for one newly read word.
    fn parse(&mut self) -> Result<(), ParseError> {
        let last = self.brackets.set().last_node();

        if last <= 0 {
            self.learn();
            return Ok(());
        }
        if self
            .brackets
            .set()
            .unit(last)
            .expect("last unit exists")
            .stop_punct(Side::Left)
            .is_some()
        {
            // no linking across stopping punctuation
            self.learn();
            return Ok(());
        }

        // the two links connecting the last two words
        let direct = DepthSet::from_min(Some(0));
        let link = LinkCandidate::new(
            &mut self.lexicon,
            self.brackets.set(),
            last - 1,
            direct,
            direct,
            self.config.ccl_basic_use_both_in_values,
        );
        self.trace_candidate(&link);
        if link.link(Side::Left) > 0.0 {
            self.add_scored_link(&link, Side::Left, direct)?;
        }
        if link.link(Side::Right) > 0.0 {
            self.add_scored_link(&link, Side::Right, direct)?;
        }

        // keep adding the strongest addable link until nothing matches;
        // while a resolution violation remains, fall back to the best
        // potential match, which must repair it
        let mut prefix_links: Vec<LinkCandidate> = Vec::new();
        let mut last_link: Option<LinkCandidate> = None;

        loop {
            self.update_prefix_links(&mut prefix_links);
            self.update_last_link(&mut last_link);

            let set = self.brackets.set();
            let mut best = strongest_match(set, &prefix_links, last_link.as_ref());
            if best.is_none() && set.has_rv() {
                best = strongest_potential_match(set, &prefix_links, last_link.as_ref());
            }

            match best {
                None => break,
                Some(Chosen::Prefix(i)) => {
                    let candidate = &prefix_links[i];
                    let depths = candidate.depths(Side::Left);
                    self.trace_candidate(candidate);
                    if !self.add_scored_link(candidate, Side::Left, depths)? {
                        return Err(ParseError::LinkRejected);
                    }
                    // a new inbound link invalidates the pending prefix
                    // candidates
                    prefix_links.clear();
                }
                Some(Chosen::Last) => {
                    let candidate = last_link.as_ref().expect("comparator chose it");
                    let depths = candidate.depths(Side::Right);
                    self.trace_candidate(candidate);
                    if !self.add_scored_link(candidate, Side::Right, depths)? {
                        return Err(ParseError::LinkRejected);
                    }
                }
            }
        }

        self.learn();
        Ok(())
    }

    /// Add the link of `candidate` based on `base_side`, if the allowed
    /// depths permit it. Marks the consumed adjacency when the link came
    /// from a real match.
    fn add_scored_link(
        &mut self,
        candidate: &LinkCandidate,
        base_side: Side,
        depths: DepthSet,
    ) -> Result<bool, ParseError> {
        let matched = candidate.link(base_side) != 0.0;
        let depth = if matched {
            if !depths.allows(candidate.depth()) {
                return Ok(false);
            }
            candidate.depth()
        } else if depths.allows(0) {
            0
        } else {
            1
        };

        self.brackets.add_link(
            candidate.pos(base_side),
            candidate.pos(base_side.opposite()),
            depth,
        )?;

        if matched {
            if let Some(unit) = self.brackets.set().unit(candidate.pos(base_side)) {
                unit.set_adj_used(candidate.best_adj(base_side));
            }
        }
        Ok(true)
    }

    /// Refresh the candidates from the prefix to the last word, keeping
    /// entries whose base and allowed depths are unchanged. The direct
    /// adjacency is excluded (it was scored separately).
    fn update_prefix_links(&mut self, links: &mut Vec<LinkCandidate>) {
        let entries: Vec<(i32, DepthSet)> = {
            let set = self.brackets.set();
            let skip = set.last_node() - 1;
            let mut iter = set.prefix_addable();
            let mut collected = Vec::new();
            while let Some(base) = iter.base() {
                if base != skip {
                    collected.push((base, iter.depths()));
                }
                iter.advance();
            }
            collected
        };

        let mut i = 0;
        for (base, depths) in entries {
            while i < links.len() && links[i].pos(Side::Left) > base {
                links.remove(i);
            }
            let keep = i < links.len()
                && links[i].pos(Side::Left) == base
                && links[i].depths(Side::Left) == depths;
            if !keep {
                let candidate = LinkCandidate::new(
                    &mut self.lexicon,
                    self.brackets.set(),
                    base,
                    depths,
                    DepthSet::none(),
                    self.config.ccl_basic_use_both_in_values,
                );
                links.insert(i, candidate);
            }
            i += 1;
        }
        links.truncate(i);
    }

    /// Refresh the candidate from the last word into the prefix. The
    /// direct adjacency is excluded.
    fn update_last_link(&mut self, slot: &mut Option<LinkCandidate>) {
        let (addable, depths) = self.brackets.set().last_addable();
        let last = self.brackets.set().last_node();

        if !depths.any() || addable < 0 || addable == last - 1 {
            *slot = None;
            return;
        }
        let keep = slot
            .as_ref()
            .is_some_and(|c| c.pos(Side::Left) == addable && c.depths(Side::Right) == depths);
        if !keep {
            *slot = Some(LinkCandidate::new(
                &mut self.lexicon,
                self.brackets.set(),
                addable,
                DepthSet::none(),
                depths,
                self.config.ccl_basic_use_both_in_values,
            ));
        }
    }

    // ── Learning ───────────────────────────────────────────────────────

    /// Queue the learning events of the last word's left side, then the
    /// right-side events of the words adjacent to it.
    fn learn(&mut self) {
        if !self.learn_cycle {
            return;
        }
        let set = self.brackets.set();
        let last = set.last_node();
        let Some(unit) = set.unit(last) else {
            return;
        };

        if last == 0 || unit.stop_punct(Side::Left).is_some() {
            self.queue.push(LearnEvent {
                unit: last,
                adj: AdjPos::new(Side::Left, 0),
                adj_unit: None,
            });
        } else {
            let mut adj = AdjPos::new(Side::Left, 0);
            let mut can_learn = true;
            // one event per leftward link, while the consumed positions
            // keep up
            let outbound: Vec<_> = set.outbound(last, Side::Left).to_vec();
            for link in outbound {
                self.queue.push(LearnEvent {
                    unit: last,
                    adj,
                    adj_unit: in_utterance(link.end, last),
                });
                let set = self.brackets.set();
                if set.unit(last).expect("last unit exists").adj_used(adj) {
                    adj.pos += 1;
                } else {
                    can_learn = false;
                    break;
                }
            }
            if can_learn {
                let unused = self.brackets.set().unused_adj(last, Side::Left);
                let adj_unit = match unused.min_depth {
                    Some(_) => in_utterance(unused.end, last),
                    None => None,
                };
                self.queue.push(LearnEvent { unit: last, adj, adj_unit });
            }
        }

        self.learn_right(last);
    }

    /// Queue right-side learning events for the words with an adjacency at
    /// `adj_unit` (which may lie just beyond the utterance).
    fn learn_right(&mut self, adj_unit: i32) {
        let last = self.brackets.set().last_node();
        let adj_to_learn = if adj_unit <= last { adj_unit } else { -1 };

        let mut pos = adj_unit - 1;
        while pos >= 0 {
            let set = self.brackets.set();
            let linked_to_adj = set
                .last_outbound(pos, Side::Right)
                .is_some_and(|lp| lp.end == adj_unit);

            let mut adj_index = set.outbound_num(pos, Side::Right) as i32;
            if linked_to_adj {
                adj_index -= 1;
            }

            let unit = set.unit(pos).expect("position is in the utterance");
            let learnable = adj_index == 0
                || unit.adj_used(AdjPos::new(Side::Right, adj_index - 1));
            if learnable {
                let blocked_by_punct = pos == adj_to_learn - 1
                    && set
                        .unit(adj_to_learn)
                        .is_some_and(|u| u.stop_punct(Side::Left).is_some());
                let event_adj_unit = if blocked_by_punct || adj_to_learn < 0 {
                    None
                } else {
                    Some(adj_to_learn)
                };
                self.queue.push(LearnEvent {
                    unit: pos,
                    adj: AdjPos::new(Side::Right, adj_index),
                    adj_unit: event_adj_unit,
                });
            }

            if linked_to_adj {
                break;
            }
            match self.brackets.set().inbound(pos, Side::Left) {
                Some(inbound) => pos = inbound.end,
                None => break,
            }
        }
    }

    // ── Tracing ────────────────────────────────────────────────────────

    fn trace_candidate(&self, candidate: &LinkCandidate) {
        if !self.trace.on(TraceBits::PARSER) {
            return;
        }
        self.trace.line(
            TraceBits::PARSER,
            &format!(
                "link <{},{}> left {:.3} right {:.3} depth {}",
                candidate.pos(Side::Left),
                candidate.pos(Side::Right),
                candidate.link(Side::Left),
                candidate.link(Side::Right),
                candidate.depth(),
            ),
        );
    }

    /// Dump the links of the current set, one node per line.
    pub fn trace_set(&self) {
        if !self.trace.on(TraceBits::CCL_SET) {
            return;
        }
        let set = self.brackets.set();
        for pos in 0..=set.last_node() {
            let mut line = String::new();
            let name = set.unit(pos).map_or("?", |u| u.name());
            let _ = write!(line, "{pos} ({name}):");
            for lp in set.outbound(pos, Side::Left).iter().rev() {
                let _ = write!(line, " <{}({})", lp.end, lp.depth);
            }
            for lp in set.outbound(pos, Side::Right) {
                let _ = write!(line, " ({}){}>", lp.depth, lp.end);
            }
            self.trace.line(TraceBits::CCL_SET, &line);
        }
    }
}

/// Is `pos` a word of the utterance whose last node is `last`?
fn in_utterance(pos: i32, last: i32) -> Option<i32> {
    if pos >= 0 && pos <= last {
        Some(pos)
    } else {
        None
    }
}

/// Select the candidate with the strongest match. Unused adjacencies beat
/// used ones; then higher strength; the last-word candidate wins an exact
/// tie only when its link is shorter (its head position is greater than
/// the prefix candidate's base). Among prefix candidates the nearer one
/// wins ties.
fn strongest_match(
    set: &CclSet,
    prefix_links: &[LinkCandidate],
    last_link: Option<&LinkCandidate>,
) -> Option<Chosen> {
    let mut best_is_used = true;
    let mut best_strength = 0.0f32;
    let mut best: Option<usize> = None;

    for (i, link) in prefix_links.iter().enumerate() {
        let strength = link.link(Side::Left);
        if strength > best_strength
            || (best_is_used && strength > 0.0 && !link.best_is_used(set, Side::Left))
        {
            best_strength = strength;
            best = Some(i);
            if best_is_used {
                best_is_used = link.best_is_used(set, Side::Left);
            }
        }
    }

    if let Some(last) = last_link {
        let strength = last.link(Side::Right);
        if strength > 0.0 {
            let last_used = last.best_is_used(set, Side::Right);
            let wins = (!last_used && best_is_used)
                || (last_used == best_is_used
                    && strength >= best_strength
                    && (strength > best_strength
                        || best.is_none_or(|i| {
                            last.pos(Side::Left) > prefix_links[i].pos(Side::Left)
                        })));
            if wins {
                return Some(Chosen::Last);
            }
        }
    }

    best.map(Chosen::Prefix)
}

/// Select the candidate with the strongest attachment potential, used when
/// no real match exists but a resolution violation must still be repaired.
/// Compares the count of labels stronger than blocking, then the strongest
/// label, with the same last-versus-prefix tie rule.
fn strongest_potential_match(
    set: &CclSet,
    prefix_links: &[LinkCandidate],
    last_link: Option<&LinkCandidate>,
) -> Option<Chosen> {
    let mut best_strong = 0usize;
    let mut best_max = 0.0f32;
    let mut best: Option<usize> = None;

    for (i, link) in prefix_links.iter().enumerate() {
        let unit = set.unit(link.pos(Side::Left)).expect("candidate in set");
        let copy = unit.stat_copy(Side::Right);
        let better = best.is_none()
            || (copy.stronger_than_block() >= best_strong
                && (copy.stronger_than_block() > best_strong || copy.strongest() > best_max));
        if better {
            best_strong = copy.stronger_than_block();
            best_max = copy.strongest();
            best = Some(i);
        }
    }

    if let Some(last) = last_link {
        let unit = set.unit(last.pos(Side::Right)).expect("candidate in set");
        let copy = unit.stat_copy(Side::Left);
        let wins = best.is_none()
            || (copy.stronger_than_block() >= best_strong
                && (copy.stronger_than_block() > best_strong
                    || copy.strongest() > best_max
                    || (copy.strongest() == best_max
                        && best.is_none_or(|i| {
                            last.pos(Side::Left) > prefix_links[i].pos(Side::Left)
                        }))));
        if wins {
            return Some(Chosen::Last);
        }
    }

    best.map(Chosen::Prefix)
}
