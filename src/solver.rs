//! Existential, BDT-valued search: which did-subsets admit a single joint
//! winning declarer strategy (§4.7, L10).
//!
//! Grounded on `original_source/jade/solver.{h,cpp}`. Unlike
//! [`crate::ansolver::AnSolver`], this recursion's transposition table is
//! keyed by the raw [`State::to_key`] rather than the canonical
//! [`crate::sthash::StateHasher`] hash: the value stored per key is a BDT
//! over *specific* dids, and collapsing defender small-card permutations
//! would conflate dids the returned family must still distinguish.

use std::collections::HashMap;

use crate::bdt::{BdtHandle, BdtManager, Lubdt};
use crate::card::Card;
use crate::dds::{DdsCache, InProcessOracle, SingleDummyOracle};
use crate::error::Result;
use crate::intset::{IntSet, Membership, PairIter};
use crate::problem::Problem;
use crate::solutil::{self, load_from_history};
use crate::state::State;

#[derive(Default, Copy, Clone, Debug)]
pub struct SolverStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_size: u64,
    pub dds_calls: u64,
    pub dds_boards: u64,
    pub dds_repeats: u64,
    pub node_visits: u64,
}

/// `{x ⊆ big : v ∈ x}` forced into every set already in `x`, for each `v`
/// only in `big` (not `small`) — widens a sub-family back up to `big`'s
/// variable space.
fn expand_bdt(mgr: &mut BdtManager, mut x: BdtHandle, big: &IntSet, small: &IntSet) -> BdtHandle {
    for (v, m) in PairIter::new(big, small) {
        if m == Membership::AOnly {
            x = mgr.extrude(x, v);
        }
    }
    x
}

/// Drops every variable only in `big` (not `small`) from `x`.
fn reduce_bdt(mgr: &mut BdtManager, mut x: BdtHandle, big: &IntSet, small: &IntSet) -> BdtHandle {
    for (v, m) in PairIter::new(big, small) {
        if m == Membership::AOnly {
            x = mgr.remove(x, v);
        }
    }
    x
}

/// Like [`reduce_bdt`] but commits each dropped variable (via `require`)
/// before removing it, so the projection only keeps sets that already
/// decided that variable.
fn reduce_require_bdt(mgr: &mut BdtManager, mut x: BdtHandle, big: &IntSet, small: &IntSet) -> BdtHandle {
    for (v, m) in PairIter::new(big, small) {
        if m == Membership::AOnly {
            x = mgr.require(x, v);
            x = mgr.remove(x, v);
        }
    }
    x
}

/// Of the candidate cards in `upmap`, the one whose did-subset is largest
/// (ties broken by card order, per §5's UPMAP iteration rule).
fn recommend_usable_play(upmap: &HashMap<Card, IntSet>) -> Card {
    let mut keys: Vec<Card> = upmap.keys().copied().collect();
    keys.sort();
    let mut best = keys[0];
    let mut best_size = upmap[&best].size();
    for &k in &keys[1..] {
        let sz = upmap[&k].size();
        if sz > best_size {
            best = k;
            best_size = sz;
        }
    }
    best
}

/// BDT-valued alpha-beta search with LUBDT interval narrowing (§4.7).
pub struct Solver {
    problem: Problem,
    oracle: Box<dyn SingleDummyOracle>,
    dds_cache: DdsCache,
    pub(crate) bdt_mgr: BdtManager,
    all_dids: IntSet,
    all_cube: BdtHandle,
    pub(crate) tt: HashMap<u64, Lubdt>,
    dds_tracker: std::collections::HashSet<(u64, u32)>,
    stats: SolverStats,
}

impl Solver {
    pub fn new(problem: Problem) -> Solver {
        Solver::with_oracle(problem, Box::new(InProcessOracle::new()))
    }

    pub fn with_oracle(problem: Problem, oracle: Box<dyn SingleDummyOracle>) -> Solver {
        let all_dids = problem.all_dids();
        let mut bdt_mgr = BdtManager::new();
        let all_cube = solutil::set_to_cube(&mut bdt_mgr, &all_dids);
        Solver {
            problem,
            oracle,
            dds_cache: DdsCache::new(),
            bdt_mgr,
            all_dids,
            all_cube,
            tt: HashMap::new(),
            dds_tracker: std::collections::HashSet::new(),
            stats: SolverStats::default(),
        }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn bdt_mgr(&self) -> &BdtManager {
        &self.bdt_mgr
    }

    pub fn bdt_mgr_mut(&mut self) -> &mut BdtManager {
        &mut self.bdt_mgr
    }

    /// Replays `plays_so_far`, drops dids no longer single-dummy achievable,
    /// and returns the BDT of jointly-solvable did-subsets (§4.7).
    pub fn eval(&mut self, plays_so_far: &[Card]) -> Result<BdtHandle> {
        let (mut state, dids) = load_from_history(&self.problem, plays_so_far)?;

        self.stats.dds_calls += 1;
        self.stats.dds_boards += dids.size() as u64;
        self.track_dds(&state, &dids);
        let dids = solutil::filter_achievable(&mut *self.oracle, &self.problem, &state, &dids, self.problem.target);

        Ok(self.eval_state(&mut state, &dids))
    }

    /// Internal `eval(state, dids)` entry point (§4.7), exposed so a caller
    /// that has already built a `(State, IntSet)` can drive the search
    /// directly, matching the teacher source's two-overload shape.
    pub fn eval_state(&mut self, state: &mut State, dids: &IntSet) -> BdtHandle {
        let search_bounds = Lubdt::new(
            solutil::set_to_atoms(&mut self.bdt_mgr, dids),
            solutil::set_to_cube(&mut self.bdt_mgr, dids),
        );
        let result = self.doit(state, dids, search_bounds);
        let widened = self.bdt_mgr.unionize(result.lower, search_bounds.lower);
        self.bdt_mgr.intersect(search_bounds.upper, widened)
    }

    fn doit(&mut self, state: &mut State, dids: &IntSet, mut search_bounds: Lubdt) -> Lubdt {
        self.stats.node_visits += 1;

        if state.ns_tricks() >= self.problem.target {
            let cube = self.bdt_mgr.cube(dids);
            return Lubdt::new(cube, cube);
        }
        debug_assert!(
            self.problem.north.size() as u8 - state.ew_tricks() >= self.problem.target,
            "target became unreachable mid-recursion"
        );

        let mut node_bounds = Lubdt::new(self.bdt_mgr.null(), self.all_cube);
        let new_trick = state.new_trick();
        let state_key = state.to_key();

        if new_trick {
            if let Some(bounds) = self.tt.get(&state_key).copied() {
                node_bounds = bounds;
                self.stats.cache_hits += 1;
            } else {
                self.stats.cache_misses += 1;
            }
        }

        let node_dids = self.bdt_mgr.get_used_vars(node_bounds.lower);
        for (v, m) in PairIter::new(dids, &node_dids) {
            if m == Membership::AOnly {
                let atom = self.bdt_mgr.atom(v);
                node_bounds.lower = self.bdt_mgr.unionize(node_bounds.lower, atom);
                node_bounds.upper = self.bdt_mgr.extrude(node_bounds.upper, v);
            }
        }

        search_bounds.lower = self.bdt_mgr.unionize(search_bounds.lower, node_bounds.lower);
        search_bounds.upper = self.bdt_mgr.intersect(search_bounds.upper, node_bounds.upper);
        if self.bdt_mgr.subset_of(search_bounds.upper, search_bounds.lower) {
            return node_bounds;
        }

        let out = if state.to_play_ew() {
            self.doit_ew(state, dids, search_bounds, node_bounds)
        } else {
            self.doit_ns(state, dids, search_bounds, node_bounds)
        };

        if new_trick {
            if !self.tt.contains_key(&state_key) {
                self.stats.cache_size += 1;
            }
            self.tt.insert(state_key, out);
        }
        out
    }

    fn doit_ew(&mut self, state: &mut State, dids: &IntSet, mut search_bounds: Lubdt, mut node_bounds: Lubdt) -> Lubdt {
        let plays = solutil::find_usable_plays_ew(&self.problem, state, dids);
        let mut cum_lower = node_bounds.upper;

        let mut cards: Vec<Card> = plays.keys().copied().collect();
        cards.sort();
        for card in cards {
            let sub_dids = plays[&card].clone();
            if sub_dids.size() == 1 {
                continue;
            }

            let sub_lower = reduce_require_bdt(&mut self.bdt_mgr, search_bounds.lower, dids, &sub_dids);
            let sub_upper = reduce_bdt(&mut self.bdt_mgr, search_bounds.upper, dids, &sub_dids);
            let sub_bounds = Lubdt::new(sub_lower, sub_upper);

            state.play(card);
            let result = self.doit(state, &sub_dids, sub_bounds);
            state.undo();

            let expanded_search = expand_bdt(&mut self.bdt_mgr, result.upper, dids, &sub_dids);
            search_bounds.upper = self.bdt_mgr.intersect(search_bounds.upper, expanded_search);

            let expanded_all = expand_bdt(&mut self.bdt_mgr, result.upper, &self.all_dids, &sub_dids);
            node_bounds.upper = self.bdt_mgr.intersect(node_bounds.upper, expanded_all);
            cum_lower = self.bdt_mgr.intersect(cum_lower, expanded_all);

            if self.bdt_mgr.subset_of(search_bounds.upper, search_bounds.lower) {
                return node_bounds;
            }
        }

        node_bounds.lower = self.bdt_mgr.unionize(node_bounds.lower, cum_lower);
        node_bounds
    }

    fn doit_ns(&mut self, state: &mut State, dids: &IntSet, mut search_bounds: Lubdt, mut node_bounds: Lubdt) -> Lubdt {
        let mut usable_plays = self.find_usable_plays_ns(state, dids);
        let mut cum_upper = node_bounds.lower;

        while !usable_plays.is_empty() {
            let card = recommend_usable_play(&usable_plays);
            let sub_dids = usable_plays.remove(&card).expect("recommend_usable_play returns a present key");
            debug_assert!(sub_dids.size() > 0, "UPMAP entries are never empty");

            if sub_dids.size() == 1 {
                continue;
            }

            let sub_lower = reduce_bdt(&mut self.bdt_mgr, search_bounds.lower, dids, &sub_dids);
            let sub_upper = reduce_bdt(&mut self.bdt_mgr, search_bounds.upper, dids, &sub_dids);
            let sub_bounds = Lubdt::new(sub_lower, sub_upper);

            state.play(card);
            let mut result = self.doit(state, &sub_dids, sub_bounds);
            state.undo();

            result.lower = reduce_bdt(&mut self.bdt_mgr, result.lower, dids, &sub_dids);
            result.upper = reduce_bdt(&mut self.bdt_mgr, result.upper, dids, &sub_dids);

            search_bounds.lower = self.bdt_mgr.unionize(search_bounds.lower, result.lower);
            node_bounds.lower = self.bdt_mgr.unionize(node_bounds.lower, result.lower);
            cum_upper = self.bdt_mgr.unionize(cum_upper, result.upper);

            if self.bdt_mgr.subset_of(search_bounds.upper, search_bounds.lower) {
                return node_bounds;
            }
        }

        node_bounds.upper = self.bdt_mgr.intersect(node_bounds.upper, cum_upper);
        node_bounds
    }

    fn find_usable_plays_ns(&mut self, state: &mut State, dids: &IntSet) -> HashMap<Card, IntSet> {
        self.stats.dds_calls += 1;
        self.stats.dds_boards += dids.size() as u64;
        self.track_dds(state, dids);
        solutil::find_usable_plays_ns(
            &mut self.dds_cache,
            &mut *self.oracle,
            &self.problem,
            state,
            dids,
            self.problem.target,
        )
    }

    /// Counts repeated double-dummy subproblems across the search tree, for
    /// `dds_repeats` (L14). Tracked at `(raw state key, did)` granularity,
    /// coarser than [`DdsCache`]'s own `(state, trick prefix, did)` key —
    /// close enough to show whether caching would help, without exposing
    /// the cache's internals here.
    fn track_dds(&mut self, state: &State, dids: &IntSet) {
        let key = state.to_key();
        for did in dids.iter() {
            if !self.dds_tracker.insert((key, did)) {
                self.stats.dds_repeats += 1;
            }
        }
    }

    pub fn get_stats(&self) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        out.insert("cache_hits".into(), self.stats.cache_hits);
        out.insert("cache_misses".into(), self.stats.cache_misses);
        out.insert("cache_size".into(), self.stats.cache_size);
        out.insert("dds_calls".into(), self.stats.dds_calls);
        out.insert("dds_boards".into(), self.stats.dds_boards);
        out.insert("dds_repeats".into(), self.stats.dds_repeats);
        out.insert("node_visits".into(), self.stats.node_visits);

        let sizes = self.bdt_mgr.get_map_sizes();
        out.insert("bdt_nodes".into(), sizes[0] as u64);
        out.insert("bdt_union_map".into(), sizes[1] as u64);
        out.insert("bdt_intersect_map".into(), sizes[2] as u64);
        out.insert("bdt_extrude_map".into(), sizes[3] as u64);
        out.insert("bdt_remove_map".into(), sizes[4] as u64);
        out.insert("bdt_require_map".into(), sizes[5] as u64);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Hand, Strain, SPADE};

    fn trivial_winner() -> Problem {
        let north = Hand::parse("AKQJ/AKQJ/AKQJ/A").unwrap();
        let south = Hand::parse("2345/2345/2345/2").unwrap();
        let west = Hand::parse("6789/6789/6789/3").unwrap();
        let known = north.union(south).union(west);
        let east = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known.bits());
        Problem::new(north, south, Strain::Suit(SPADE), 13, vec![(west, east)]).unwrap()
    }

    #[test]
    fn all_trump_winner_solves_the_single_did() {
        let mut solver = Solver::new(trivial_winner());
        let bdt = solver.eval(&[]).unwrap();
        let mgr = solver.bdt_mgr_mut();
        let cubes = mgr.get_cubes(bdt);
        assert_eq!(cubes.len(), 1);
        assert_eq!(cubes[0], IntSet::from_iter([0]));
    }

    #[test]
    fn finesse_position_splits_into_two_singleton_cubes() {
        let north = Hand::parse("AQ2/AKQ/AKQ/AKQJ").unwrap();
        let south = Hand::parse("K43/J43/J43/2345").unwrap();
        let west_a = Hand::parse("J65/T98/T98/T9").unwrap();
        let known_a = north.union(south).union(west_a);
        let east_a = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known_a.bits());
        let west_b = Hand::parse("765/T98/T98/T9").unwrap();
        let known_b = north.union(south).union(west_b);
        let east_b = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known_b.bits());
        let problem = Problem::new(
            north,
            south,
            Strain::Suit(SPADE),
            12,
            vec![(west_a, east_a), (west_b, east_b)],
        )
        .unwrap();
        let mut solver = Solver::new(problem);
        let bdt = solver.eval(&[]).unwrap();
        let mut cubes = solver.bdt_mgr_mut().get_cubes(bdt);
        cubes.sort_by_key(|s| s.iter().next().unwrap_or(u32::MAX));
        assert_eq!(cubes, vec![IntSet::from_iter([0]), IntSet::from_iter([1])]);
    }

    #[test]
    fn stats_report_node_visits_and_bdt_sizes() {
        let mut solver = Solver::new(trivial_winner());
        solver.eval(&[]).unwrap();
        let stats = solver.get_stats();
        assert!(stats["node_visits"] > 0);
        assert!(stats.contains_key("bdt_nodes"));
    }
}
