//! Double-dummy oracle adapter and per-(state,did) cache (§4.5, L7/L8).
//!
//! The batch DD oracle itself is excluded from this core (§1) — the oracle's
//! *algorithm* is external collaborator territory. What this module owns is
//! the boundary: [`SingleDummyOracle`] is the trait a batched external DDS
//! binding would implement; [`InProcessOracle`] is the one implementation
//! that ships with this crate, built on this codebase's own teacher module
//! (the alpha-beta/MTD(f) engine in [`crate::dd_oracle`]) rather than a
//! foreign-function call. [`DdsCache`] memoizes per-(state, trick prefix,
//! did) winning-card results so repeated subproblems across the search tree
//! cost one oracle solve instead of many.

use std::collections::HashMap;

use crate::card::{hand_suit_bits, Card, Hand, Seat, Strain};
use crate::dd_oracle::cards::{card_of, rank_of, suit_of};
use crate::dd_oracle::{
    Cards, CutoffCache, Hands as OracleHands, PartialTrick, PatternCache, Solver as OracleSolver,
};
use crate::problem::Problem;
use crate::state::State;

/// Batch size the external DD oracle's real entry point would accept per
/// request (§4.5). The in-process oracle has no such limit, but the DD
/// loader still chunks at this boundary so its shape matches a real FFI
/// binding's.
pub const MAXNOOFBOARDS: usize = 32;

/// `dd_card_index(card)`: our `(suit, rank)` to the oracle's packed index
/// `suit*13 + (12 - (rank-2))`. Both modules use the same SHDC suit numbering
/// (§9 resolves the ambiguity the same way for both), so only rank needs a
/// shift.
#[inline]
pub(crate) fn to_oracle_card(card: Card) -> usize {
    card_of(card.suit as usize, (card.rank - 2) as usize)
}

#[inline]
pub(crate) fn from_oracle_card(card: usize) -> Card {
    Card::new(suit_of(card) as u8, rank_of(card) as u8 + 2)
}

#[inline]
pub(crate) fn to_oracle_seat(seat: Seat) -> crate::dd_oracle::types::Seat {
    seat.index()
}

#[inline]
pub(crate) fn from_oracle_seat(seat: crate::dd_oracle::types::Seat) -> Seat {
    Seat::from_index(seat)
}

pub(crate) fn hand_to_oracle_cards(hand: Hand) -> Cards {
    let mut cards = Cards::new();
    for card in hand.iter() {
        cards.add(to_oracle_card(card));
    }
    cards
}

/// The four hands in a did's layout, with `played` already removed.
fn remaining_hands(problem: &Problem, played: u64, did: u32) -> [Hand; 4] {
    let mask = !played;
    [
        Hand::from_bits(problem.south.bits() & mask), // indexed by Seat::South below too
        Hand::from_bits(problem.north.bits() & mask),
        Hand::from_bits(problem.west(did).bits() & mask),
        Hand::from_bits(problem.east(did).bits() & mask),
    ]
}

fn seat_hand(hands: &[Hand; 4], seat: Seat) -> Hand {
    match seat {
        Seat::South => hands[0],
        Seat::North => hands[1],
        Seat::West => hands[2],
        Seat::East => hands[3],
    }
}

/// Legal plays for `hand` given the suit led so far this trick (`None` if
/// leading); grounded on `dd_oracle::play::get_playable_cards`'s
/// must-follow-suit rule, specialized to this crate's `Hand` bitboard.
pub fn legal_plays(hand: Hand, suit_led: Option<u8>) -> Hand {
    if let Some(suit) = suit_led {
        let in_suit = hand_suit_bits(hand.bits(), suit);
        if in_suit != 0 {
            return Hand::from_bits((in_suit as u64) << (16 * suit as u32));
        }
    }
    hand
}

/// Trait boundary a batched external double-dummy solver binding would
/// implement in place of [`InProcessOracle`] (§4.5a).
pub trait SingleDummyOracle {
    /// NS tricks achievable with optimal play by both sides, for the rest of
    /// the deal from `state` forward (including the trick in progress, if
    /// any), given `did`'s West/East layout.
    fn ns_tricks_from(&mut self, problem: &Problem, state: &State, did: u32) -> u8;

    /// Running count of oracle calls, for `get_stats()` (L14). Default
    /// implementation for bindings that don't track it themselves.
    fn dds_calls(&self) -> u64 {
        0
    }
}

/// In-process oracle built on this crate's own `dd_oracle` alpha-beta/MTD(f)
/// engine (§4.5a). Not a real batched external call — every "chunk" is
/// solved sequentially — but it honors the same boundary shape so a real FFI
/// binding could be swapped in without touching L10/L11.
pub struct InProcessOracle {
    cutoff_cache: CutoffCache,
    pattern_cache: PatternCache,
    dds_calls: u64,
    /// Configurable thread budget knob (§5). The in-process engine is
    /// single-threaded by construction (this crate's Non-goals exclude
    /// concurrent evaluation of one solver instance), so this is recorded
    /// for parity with a real oracle binding's constructor surface but does
    /// not change behavior.
    thread_budget: usize,
}

impl Default for InProcessOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessOracle {
    pub fn new() -> InProcessOracle {
        InProcessOracle {
            cutoff_cache: CutoffCache::new(16),
            pattern_cache: PatternCache::new(16),
            dds_calls: 0,
            thread_budget: 1,
        }
    }

    pub fn set_thread_budget(&mut self, budget: usize) {
        self.thread_budget = budget.max(1);
    }

    pub fn thread_budget(&self) -> usize {
        self.thread_budget
    }

    pub fn dds_calls(&self) -> u64 {
        self.dds_calls
    }
}

impl SingleDummyOracle for InProcessOracle {
    fn ns_tricks_from(&mut self, problem: &Problem, state: &State, did: u32) -> u8 {
        self.dds_calls += 1;
        let hands_by_seat = remaining_hands(problem, state.played(), did);
        let trick_pos = if state.new_trick() { 0 } else { state.num_played() % 4 };

        let mut oracle_hands = OracleHands::new();
        for &seat in &Seat::ALL {
            *oracle_hands.hand_mut(to_oracle_seat(seat)) =
                hand_to_oracle_cards(seat_hand(&hands_by_seat, seat));
        }

        if trick_pos == 0 {
            let leader = to_oracle_seat(state.to_play());
            let solver = OracleSolver::new(oracle_hands, strain_code(state.trump()), leader);
            return solver.solve_with_caches(&mut self.cutoff_cache, &mut self.pattern_cache);
        }

        let mut partial = PartialTrick::new();
        let leader = state.trick_leader();
        for i in 0..trick_pos {
            let card = state
                .trick_card(i)
                .expect("trick_pos cards must already be played");
            let seat = Seat::from_index(leader.index() + i as usize);
            partial.add(to_oracle_card(card), to_oracle_seat(seat));
        }

        let solver = OracleSolver::new_mid_trick(oracle_hands, strain_code(state.trump()), &partial)
            .expect("partial trick built from State must be valid (1..=3 cards)");
        solver.solve_mid_trick(&mut self.cutoff_cache, &mut self.pattern_cache, &partial)
    }

    fn dds_calls(&self) -> u64 {
        self.dds_calls
    }
}

#[inline]
fn strain_code(trump: Strain) -> usize {
    trump.code() as usize
}

/// Stats for [`DdsCache`] (part of L14's `dds_calls`/cache counters).
#[derive(Default, Copy, Clone, Debug)]
pub struct DdsCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes per-(state, trick prefix, did) winning-card results (§4.5's DD
/// cache). Keyed on the *raw* state key plus the packed bits of the cards
/// already played into the current trick — not the canonical hash, since the
/// DD oracle result depends on exactly which physical cards are in each
/// hand, which the canonicalized hasher deliberately blurs.
pub struct DdsCache {
    cache: HashMap<(u64, u64, u32), Hand>,
    stats: DdsCacheStats,
}

impl Default for DdsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DdsCache {
    pub fn new() -> DdsCache {
        DdsCache {
            cache: HashMap::new(),
            stats: DdsCacheStats::default(),
        }
    }

    pub fn stats(&self) -> DdsCacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn trick_prefix_bits(state: &State) -> u64 {
        let trick_pos = if state.new_trick() { 0 } else { state.num_played() % 4 };
        let mut bits = 0u64;
        for i in 0..trick_pos {
            if let Some(card) = state.trick_card(i) {
                bits |= crate::card::card_to_handbit(card);
            }
        }
        bits
    }

    /// For each did in `dids`, the set of cards in `hand` (the seat on
    /// play's *original* 13-card holding; already-played cards are masked
    /// off internally) that keep `target` total NS tricks achievable for
    /// that did's layout: playing the card and continuing with optimal
    /// double-dummy play by both sides from there still reaches `target`.
    /// Splits into cached hits and dids solved via `oracle`, mutating
    /// `state` by play/undo around each trial (never left mutated on
    /// return).
    pub fn winning_cards(
        &mut self,
        oracle: &mut dyn SingleDummyOracle,
        problem: &Problem,
        state: &mut State,
        dids: &crate::intset::IntSet,
        hand: Hand,
        target: u8,
    ) -> HashMap<u32, Hand> {
        let state_key = state.to_key();
        let trick_bits = Self::trick_prefix_bits(state);
        let suit_led = state.suit_led();
        let remaining = Hand::from_bits(hand.bits() & !state.played());
        let candidates = legal_plays(remaining, suit_led);

        let mut out = HashMap::with_capacity(dids.size());
        for did in dids.iter() {
            let key = (state_key, trick_bits, did);
            if let Some(&cached) = self.cache.get(&key) {
                self.stats.hits += 1;
                out.insert(did, cached);
                continue;
            }
            self.stats.misses += 1;
            let mut winning = Hand::EMPTY;
            for card in candidates.iter() {
                state.play(card);
                let reached = state.ns_tricks() + oracle.ns_tricks_from(problem, state, did);
                state.undo();
                if reached >= target {
                    winning = winning.union(Hand::from_bits(crate::card::card_to_handbit(card)));
                }
            }
            self.cache.insert(key, winning);
            out.insert(did, winning);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Strain, DIAMOND, HEART, SPADE};

    fn trivial_problem() -> Problem {
        let north = Hand::parse("AKQJ/AKQJ/AKQJ/A").unwrap();
        let south = Hand::parse("2345/2345/2345/2").unwrap();
        let west = Hand::parse("6789/6789/6789/3").unwrap();
        let known = north.union(south).union(west);
        let east = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known.bits());
        Problem::new(north, south, Strain::Suit(SPADE), 13, vec![(west, east)]).unwrap()
    }

    #[test]
    fn oracle_card_roundtrip() {
        for suit in 0..4u8 {
            for rank in 2..=14u8 {
                let card = Card::new(suit, rank);
                assert_eq!(from_oracle_card(to_oracle_card(card)), card);
            }
        }
    }

    #[test]
    fn seat_roundtrip() {
        for &seat in &Seat::ALL {
            assert_eq!(from_oracle_seat(to_oracle_seat(seat)), seat);
        }
    }

    #[test]
    fn legal_plays_follows_suit_when_able() {
        let hand = Hand::parse("A2/K3/-/-").unwrap();
        let only_hearts = legal_plays(hand, Some(HEART));
        assert_eq!(only_hearts, Hand::parse("-/K3/-/-").unwrap());
        let any = legal_plays(hand, Some(DIAMOND));
        assert_eq!(any, hand);
    }

    #[test]
    fn all_trump_winner_is_fully_winning_from_the_top() {
        let problem = trivial_problem();
        let mut oracle = InProcessOracle::new();
        let state = State::new(problem.trump);
        let tricks = oracle.ns_tricks_from(&problem, &state, 0);
        assert_eq!(tricks, 13);
        assert!(oracle.dds_calls() > 0);
    }

    #[test]
    fn winning_cards_cache_hits_on_repeat_query() {
        let problem = trivial_problem();
        let mut oracle = InProcessOracle::new();
        let mut cache = DdsCache::new();
        let mut state = State::new(problem.trump);
        let dids = problem.all_dids();

        let first = cache.winning_cards(&mut oracle, &problem, &mut state, &dids, problem.south, 13);
        // All of declarer's low trumps win every remaining trick here, so
        // every card South holds is a winning lead.
        assert_eq!(first[&0], problem.south);
        let before = cache.stats();
        let _second = cache.winning_cards(&mut oracle, &problem, &mut state, &dids, problem.south, 13);
        let after = cache.stats();
        assert!(after.hits > before.hits);
        assert_eq!(state.num_played(), 0, "cache must leave state unmutated");
    }
}
