//! All-or-none boolean search: does a single declarer strategy reach `target`
//! against every hypothesized layout at once (§4.6, L11).
//!
//! Grounded on `original_source/jade/ansolver.{h,cpp}`. Unlike [`crate::solver::Solver`],
//! this recursion's transposition table is keyed by [`StateHasher::hash`] (the
//! canonical, defender-permutation-collapsed key) rather than raw
//! `State::to_key()`, since a boolean "is this did-set winnable" answer is
//! invariant under defender small-card relabeling in a way a BDT family of
//! *specific* dids is not.

use std::collections::HashMap;

use crate::bdt::{BdtHandle, BdtManager, Lubdt};
use crate::card::Card;
use crate::dds::{DdsCache, InProcessOracle, SingleDummyOracle};
use crate::error::Result;
use crate::intset::IntSet;
use crate::problem::Problem;
use crate::solutil::{self, all_can_win, is_target_achievable, load_from_history};
use crate::state::State;
use crate::sthash::StateHasher;

#[derive(Default, Copy, Clone, Debug)]
pub struct AnSolverStats {
    pub cache_cutoffs: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_size: u64,
    pub dds_calls: u64,
    pub node_visits: u64,
}

/// Boolean alpha-beta search over did-subsets, pruned by a TT keyed on the
/// canonical state hash (§4.6).
pub struct AnSolver {
    problem: Problem,
    hasher: StateHasher,
    dds_cache: DdsCache,
    oracle: Box<dyn SingleDummyOracle>,
    pub(crate) bdt_mgr: BdtManager,
    all_dids: IntSet,
    all_cube: BdtHandle,
    pub(crate) tt: HashMap<u64, Lubdt>,
    stats: AnSolverStats,
}

impl AnSolver {
    /// Builds a solver backed by the in-process `dd_oracle` engine. Use
    /// [`AnSolver::with_oracle`] to plug in a different `SingleDummyOracle`
    /// (e.g. a batched external DDS binding).
    pub fn new(problem: Problem) -> AnSolver {
        AnSolver::with_oracle(problem, Box::new(InProcessOracle::new()))
    }

    pub fn with_oracle(problem: Problem, oracle: Box<dyn SingleDummyOracle>) -> AnSolver {
        let hasher = StateHasher::new(&problem);
        let all_dids = problem.all_dids();
        AnSolver {
            problem,
            hasher,
            dds_cache: DdsCache::new(),
            oracle,
            bdt_mgr: BdtManager::new(),
            all_dids,
            all_cube: BdtHandle::default(),
            tt: HashMap::new(),
            stats: AnSolverStats::default(),
        }
    }

    pub(crate) fn from_parts(
        problem: Problem,
        bdt_mgr: BdtManager,
        tt: HashMap<u64, Lubdt>,
    ) -> AnSolver {
        let mut solver = AnSolver::new(problem);
        solver.bdt_mgr = bdt_mgr;
        solver.tt = tt;
        solver
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn bdt_mgr(&self) -> &BdtManager {
        &self.bdt_mgr
    }

    /// Number of transposition-table entries, for persistence (§4.8).
    pub fn tt_len(&self) -> usize {
        self.tt.len()
    }

    /// Iterates `(state_hash, bounds)` TT entries in arbitrary order, for
    /// persistence (§4.8).
    pub fn tt_iter(&self) -> impl Iterator<Item = (&u64, &Lubdt)> {
        self.tt.iter()
    }

    fn all_cube(&mut self) -> BdtHandle {
        if self.all_cube == self.bdt_mgr.null() {
            self.all_cube = solutil::set_to_cube(&mut self.bdt_mgr, &self.all_dids);
        }
        self.all_cube
    }

    /// Reconstructs state from `plays_so_far` against every did, runs
    /// preflight (§4.6.1), and recurses if both necessary conditions hold.
    pub fn eval(&mut self, plays_so_far: &[Card]) -> Result<bool> {
        let (mut state, dids) = load_from_history(&self.problem, plays_so_far)?;
        self.eval_preflighted(&mut state, dids)
    }

    /// Same as [`AnSolver::eval`] but narrowed to a caller-supplied did
    /// subset up front (§4.6's second public entry point).
    pub fn eval_with_dids(&mut self, plays_so_far: &[Card], dids: &IntSet) -> Result<bool> {
        let (mut state, replay_dids) = load_from_history(&self.problem, plays_so_far)?;
        let dids = IntSet::from_iter(replay_dids.iter().filter(|d| dids.contains(*d)));
        self.eval_preflighted(&mut state, dids)
    }

    fn eval_preflighted(&mut self, state: &mut State, dids: IntSet) -> Result<bool> {
        if !is_target_achievable(&mut *self.oracle, &self.problem, state, &dids, self.problem.target) {
            return Ok(false);
        }
        self.stats.dds_calls += 1;
        let winners = all_can_win(
            &mut self.dds_cache,
            &mut *self.oracle,
            &self.problem,
            state,
            &dids,
            self.problem.target,
        );
        if winners.size() == 0 {
            return Ok(false);
        }
        Ok(self.eval_state(state, &dids))
    }

    /// Internal recursion entry point (§4.6.2). Public so the solver can be
    /// driven from an already-built `(State, IntSet)`, e.g. by [`AnSolver::fill_tt`].
    pub fn eval_state(&mut self, state: &mut State, dids: &IntSet) -> bool {
        self.stats.node_visits += 1;

        if state.ns_tricks() >= self.problem.target {
            return true;
        }
        debug_assert!(
            self.problem.north.size() as u8 - state.ew_tricks() >= self.problem.target,
            "target became unreachable mid-recursion"
        );

        let new_trick = state.new_trick();
        let state_key = self.hasher.hash(state);

        if new_trick {
            if let Some(bounds) = self.tt.get(&state_key).copied() {
                self.stats.cache_hits += 1;
                if self.bdt_mgr.contains(bounds.lower, dids) {
                    self.stats.cache_cutoffs += 1;
                    return true;
                }
                if !self.bdt_mgr.contains(bounds.upper, dids) {
                    self.stats.cache_cutoffs += 1;
                    return false;
                }
            } else {
                self.stats.cache_misses += 1;
            }
        }

        let result = if state.to_play_ew() {
            self.doit_ew(state, dids)
        } else {
            self.doit_ns(state, dids)
        };

        if new_trick {
            if !self.tt.contains_key(&state_key) {
                let all_cube = self.all_cube();
                let atoms = solutil::set_to_atoms(&mut self.bdt_mgr, dids);
                self.tt.insert(state_key, Lubdt::new(atoms, all_cube));
                self.stats.cache_size += 1;
            }

            if result {
                let cube = self.bdt_mgr.cube(dids);
                let entry = self.tt.get_mut(&state_key).expect("just inserted above");
                entry.lower = self.bdt_mgr.unionize(entry.lower, cube);
            } else {
                let ac = solutil::bdt_anti_cube(&mut self.bdt_mgr, &self.all_dids, dids);
                let entry = self.tt.get_mut(&state_key).expect("just inserted above");
                entry.upper = self.bdt_mgr.intersect(entry.upper, ac);
            }
        }

        result
    }

    fn doit_ew(&mut self, state: &mut State, dids: &IntSet) -> bool {
        let plays = solutil::find_usable_plays_ew(&self.problem, state, dids);
        for (card, sub_dids) in plays.iter() {
            if sub_dids.size() == 1 {
                continue;
            }
            state.play(*card);
            let result = self.eval_state(state, sub_dids);
            state.undo();
            if !result {
                return false;
            }
        }
        true
    }

    fn doit_ns(&mut self, state: &mut State, dids: &IntSet) -> bool {
        for card in self.find_usable_plays_ns(state, dids) {
            state.play(card);
            let result = self.eval_state(state, dids);
            state.undo();
            if result {
                return true;
            }
        }
        false
    }

    /// Cards simultaneously winning across every did in `dids` (§4.6.2's
    /// N/S branch candidate set).
    fn find_usable_plays_ns(&mut self, state: &mut State, dids: &IntSet) -> Vec<Card> {
        self.stats.dds_calls += 1;
        let winners = all_can_win(
            &mut self.dds_cache,
            &mut *self.oracle,
            &self.problem,
            state,
            dids,
            self.problem.target,
        );
        let mut out: Vec<Card> = winners.iter().collect();
        out.sort();
        out
    }

    /// Warms the TT by recursively visiting every reachable new-trick state
    /// from `plays_so_far`, without short-circuiting on the first winning
    /// line (§4.6.3).
    pub fn fill_tt(&mut self, plays_so_far: &[Card]) -> Result<()> {
        let (mut state, dids) = load_from_history(&self.problem, plays_so_far)?;
        let achievable =
            is_target_achievable(&mut *self.oracle, &self.problem, &state, &dids, self.problem.target);
        debug_assert!(achievable, "fill_tt called from an already-lost history");

        self.stats.dds_calls += 1;
        let winners = all_can_win(
            &mut self.dds_cache,
            &mut *self.oracle,
            &self.problem,
            &mut state,
            &dids,
            self.problem.target,
        );
        debug_assert!(winners.size() > 0, "fill_tt called from an already-lost history");

        let mut visited: HashMap<u64, BdtHandle> = HashMap::new();
        self.fill_tt_inner(&mut visited, &mut state, &dids);
        Ok(())
    }

    fn fill_tt_inner(&mut self, visited: &mut HashMap<u64, BdtHandle>, state: &mut State, dids: &IntSet) {
        if state.new_trick() {
            let key = self.hasher.hash(state);
            let cube = self.bdt_mgr.cube(dids);
            match visited.get(&key).copied() {
                Some(seen) if self.bdt_mgr.contains(seen, dids) => return,
                Some(seen) => {
                    visited.insert(key, self.bdt_mgr.unionize(seen, cube));
                }
                None => {
                    visited.insert(key, cube);
                }
            }
        }

        if !self.eval_state(state, dids) {
            return;
        }

        if state.to_play_ns() {
            for card in self.find_usable_plays_ns(state, dids) {
                state.play(card);
                self.fill_tt_inner(visited, state, dids);
                state.undo();
            }
        } else {
            let plays = solutil::find_usable_plays_ew(&self.problem, state, dids);
            let max_len = plays.values().map(|s| s.size()).max().unwrap_or(0);
            if max_len <= 1 {
                return;
            }
            let mut cards: Vec<Card> = plays.keys().copied().collect();
            cards.sort();
            for card in cards {
                let sub_dids = plays[&card].clone();
                if sub_dids.size() != max_len {
                    continue;
                }
                state.play(card);
                self.fill_tt_inner(visited, state, &sub_dids);
                state.undo();
            }
        }
    }

    pub fn get_stats(&self) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        out.insert("cache_cutoffs".into(), self.stats.cache_cutoffs);
        out.insert("cache_hits".into(), self.stats.cache_hits);
        out.insert("cache_misses".into(), self.stats.cache_misses);
        out.insert("cache_size".into(), self.stats.cache_size);
        out.insert("dds_calls".into(), self.stats.dds_calls);
        out.insert("node_visits".into(), self.stats.node_visits);
        out.insert("tt_size".into(), self.tt.len() as u64);
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
    fn all_trump_winner_makes_every_trick() {
        let mut solver = AnSolver::new(trivial_winner());
        assert!(solver.eval(&[]).unwrap());
        assert!(solver.get_stats()["node_visits"] > 0);
    }

    #[test]
    fn unreachable_target_fails_preflight_without_recursing() {
        let north = Hand::parse("AKQJ/AKQJ/AKQJ/A").unwrap();
        let south = Hand::parse("2345/2345/2345/2").unwrap();
        let west = Hand::parse("6789/6789/6789/3").unwrap();
        let known = north.union(south).union(west);
        let east = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known.bits());
        // 13 tricks is impossible once west's singleton club ace captures one
        // for the defense before declarer's trumps run.
        let west = Hand::parse("6789/6789/6789/K").unwrap();
        let known = north.union(south).union(west);
        let east = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known.bits());
        let problem = Problem::new(north, south, Strain::Suit(SPADE), 13, vec![(west, east)]).unwrap();
        let mut solver = AnSolver::new(problem);
        assert!(!solver.eval(&[]).unwrap());
        assert_eq!(solver.get_stats()["node_visits"], 0);
    }

    #[test]
    fn finesse_position_has_no_single_line_winning_both_layouts() {
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
        let mut solver = AnSolver::new(problem);
        assert!(!solver.eval(&[]).unwrap());
    }

    #[test]
    fn fill_tt_populates_cache_without_short_circuiting() {
        let mut solver = AnSolver::new(trivial_winner());
        solver.fill_tt(&[]).unwrap();
        assert!(solver.get_stats()["tt_size"] > 0);
    }
}
