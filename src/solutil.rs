//! Shared preflight and bounds helpers used by both [`crate::ansolver::AnSolver`]
//! and [`crate::solver::Solver`] (§4.6.1/§4.7's `[SUPPLEMENT]` note, L13).
//!
//! Grounded on `original_source/jade/solutil.{h,cpp}`: a handful of free
//! functions neither solver owns exclusively, kept here instead of
//! duplicated into both recursions.

use std::collections::HashMap;

use crate::bdt::{BdtHandle, BdtManager};
use crate::card::{card_to_handbit, hand_suit_bits, Card, Hand, Seat};
use crate::dds::{legal_plays, DdsCache, SingleDummyOracle};
use crate::error::{EngineError, Result};
use crate::intset::IntSet;
use crate::problem::Problem;
use crate::state::State;

/// Replays `plays` from the opening lead, narrowing `dids` to the layouts
/// consistent with every defender card actually played (§4.6.1). A defender
/// card is inconsistent with a did if that did's hand doesn't hold it, or if
/// it discards a suit the did's hand could have followed.
pub fn load_from_history(problem: &Problem, plays: &[Card]) -> Result<(State, IntSet)> {
    let mut state = State::new(problem.trump);
    let mut dids = problem.all_dids();

    for &card in plays {
        let seat = state.to_play();
        let suit_led = state.suit_led();

        if seat.is_ns() {
            let hand = match seat {
                Seat::North => problem.north,
                Seat::South => problem.south,
                _ => unreachable!("is_ns seat is North or South"),
            };
            if !hand.contains(card) {
                return Err(EngineError::ProblemConstruction(format!(
                    "history plays {card} which {seat} is not known to hold"
                )));
            }
        } else {
            let mut kept = IntSet::new();
            for did in dids.iter() {
                let defender_hand = match seat {
                    Seat::West => problem.west(did),
                    Seat::East => problem.east(did),
                    _ => unreachable!("is_ew seat is West or East"),
                };
                if !defender_hand.contains(card) {
                    continue;
                }
                if let Some(led) = suit_led {
                    if card.suit != led {
                        let remaining = defender_hand.bits() & !state.played();
                        if hand_suit_bits(remaining, led) != 0 {
                            // Could have followed suit but didn't: this did
                            // doesn't explain the observed history.
                            continue;
                        }
                    }
                }
                kept.insert(did);
            }
            dids = kept;
        }

        state.play(card);
    }

    Ok((state, dids))
}

/// Cheap arithmetic necessary condition, ahead of any DD call: EW has
/// already won more tricks than it could afford while still letting NS
/// reach `target` out of 13 (§4.6.1/§4.6.2).
pub fn target_still_possible(state: &State, target: u8) -> bool {
    state.ew_tricks() + target <= 13
}

/// Batched DD necessary condition (§4.6.1): every did in `dids` must still
/// be single-dummy winnable to `target` from `state`, independent of whose
/// turn it is — the oracle already accounts for optimal defense.
pub fn is_target_achievable(
    oracle: &mut dyn SingleDummyOracle,
    problem: &Problem,
    state: &State,
    dids: &IntSet,
    target: u8,
) -> bool {
    for did in dids.iter() {
        let reachable = state.ns_tricks() + oracle.ns_tricks_from(problem, state, did);
        if reachable < target {
            return false;
        }
    }
    true
}

/// UPMAP (§9): groups the legal defender plays across `dids` by card, so the
/// E/W search branch (§4.6.2/§4.7) can enumerate cards rather than dids.
/// Panics if `state.to_play()` is not a defender seat.
pub fn find_usable_plays_ew(problem: &Problem, state: &State, dids: &IntSet) -> HashMap<Card, IntSet> {
    let seat = state.to_play();
    let suit_led = state.suit_led();
    let mut upmap: HashMap<Card, IntSet> = HashMap::new();

    for did in dids.iter() {
        let hand = match seat {
            Seat::West => problem.west(did),
            Seat::East => problem.east(did),
            _ => unreachable!("find_usable_plays_ew called on a declarer-side turn"),
        };
        let remaining = Hand::from_bits(hand.bits() & !state.played());
        let legal = legal_plays(remaining, suit_led);
        for card in legal.iter() {
            upmap.entry(card).or_insert_with(IntSet::new).insert(did);
        }
    }

    upmap
}

/// UPMAP variant for the declarer side (§4.7's `find_usable_plays_ns`, used
/// by [`crate::solver::Solver`] rather than [`crate::ansolver::AnSolver`],
/// which only needs the intersection [`all_can_win`] computes): for each did
/// in `dids`, the cards that keep `target` achievable for that did,
/// re-grouped by card. Panics if `state.to_play()` is not a declarer-side
/// seat.
pub fn find_usable_plays_ns(
    dds_cache: &mut DdsCache,
    oracle: &mut dyn SingleDummyOracle,
    problem: &Problem,
    state: &mut State,
    dids: &IntSet,
    target: u8,
) -> HashMap<Card, IntSet> {
    let seat = state.to_play();
    let hand = match seat {
        Seat::North => problem.north,
        Seat::South => problem.south,
        _ => unreachable!("find_usable_plays_ns called on a defender turn"),
    };

    let per_did = dds_cache.winning_cards(oracle, problem, state, dids, hand, target);
    let mut upmap: HashMap<Card, IntSet> = HashMap::new();
    for did in dids.iter() {
        for card in per_did[&did].iter() {
            upmap.entry(card).or_insert_with(IntSet::new).insert(did);
        }
    }
    upmap
}

/// Per-did necessary-condition filter (§4.7's `eval_2`): drops any did for
/// which NS can no longer reach `target` with optimal play by both sides
/// from `state` onward. The original C++ tests this from two directions —
/// "NS's own target fails" when NS is on play, "EW's target succeeds" when
/// EW is on play — but both framings solve the same fixed position and
/// therefore agree on the same boolean per did, so one direction-agnostic
/// check suffices here.
pub fn filter_achievable(
    oracle: &mut dyn SingleDummyOracle,
    problem: &Problem,
    state: &State,
    dids: &IntSet,
    target: u8,
) -> IntSet {
    let mut kept = IntSet::new();
    for did in dids.iter() {
        let reachable = state.ns_tricks() + oracle.ns_tricks_from(problem, state, did) >= target;
        if reachable {
            kept.insert(did);
        } else {
            log::warn!("removing did {did} for failure to win");
        }
    }
    kept
}

/// N/S branch's candidate set (§4.6.2): cards that are simultaneously
/// winning-to-`target` across every did in `dids`, as the intersection of
/// each did's per-did winning-card set. Panics if `state.to_play()` is not
/// a declarer-side seat.
#[allow(clippy::too_many_arguments)]
pub fn all_can_win(
    dds_cache: &mut DdsCache,
    oracle: &mut dyn SingleDummyOracle,
    problem: &Problem,
    state: &mut State,
    dids: &IntSet,
    target: u8,
) -> Hand {
    let seat = state.to_play();
    let hand = match seat {
        Seat::North => problem.north,
        Seat::South => problem.south,
        _ => unreachable!("all_can_win called on a defender turn"),
    };

    let per_did = dds_cache.winning_cards(oracle, problem, state, dids, hand, target);
    let mut dids_iter = dids.iter();
    let first = match dids_iter.next() {
        Some(did) => per_did[&did],
        None => return Hand::EMPTY,
    };
    dids_iter.fold(first, |acc, did| acc.intersect(per_did[&did]))
}

/// Thin name-preserving wrapper around [`BdtManager::atoms`] (§4.7).
pub fn set_to_atoms(mgr: &mut BdtManager, dids: &IntSet) -> BdtHandle {
    mgr.atoms(dids)
}

/// Thin name-preserving wrapper around [`BdtManager::cube`] (§4.7).
pub fn set_to_cube(mgr: &mut BdtManager, dids: &IntSet) -> BdtHandle {
    mgr.cube(dids)
}

/// Thin name-preserving wrapper around [`BdtManager::anti_cube`] (§4.7).
pub fn bdt_anti_cube(mgr: &mut BdtManager, all_dids: &IntSet, dids: &IntSet) -> BdtHandle {
    mgr.anti_cube(all_dids, dids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Strain, SPADE};
    use crate::dds::InProcessOracle;

    fn trivial_problem() -> Problem {
        let north = Hand::parse("AKQJ/AKQJ/AKQJ/A").unwrap();
        let south = Hand::parse("2345/2345/2345/2").unwrap();
        let west = Hand::parse("6789/6789/6789/3").unwrap();
        let known = north.union(south).union(west);
        let east = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known.bits());
        Problem::new(north, south, Strain::Suit(SPADE), 13, vec![(west, east)]).unwrap()
    }

    #[test]
    fn load_from_history_replays_legal_plays() {
        let problem = trivial_problem();
        let plays = vec![Card::new(SPADE, 6), Card::new(SPADE, 14)];
        let (state, dids) = load_from_history(&problem, &plays).unwrap();
        assert_eq!(state.num_played(), 2);
        assert_eq!(dids, problem.all_dids());
    }

    #[test]
    fn load_from_history_drops_inconsistent_did() {
        use crate::card::{CLUB, DIAMOND, HEART};

        fn hand(cards: &[(u8, u8)]) -> Hand {
            let mut bits = 0u64;
            for &(suit, rank) in cards {
                bits |= card_to_handbit(Card::new(suit, rank));
            }
            Hand::from_bits(bits)
        }

        // North and south are fixed and known to both layouts.
        let mut north_cards: Vec<(u8, u8)> = vec![(SPADE, 14), (CLUB, 2)];
        north_cards.extend((2..=12).map(|r| (HEART, r)));
        let north = hand(&north_cards);

        let mut south_cards: Vec<(u8, u8)> = vec![(SPADE, 2), (CLUB, 3)];
        south_cards.extend((2..=12).map(|r| (DIAMOND, r)));
        let south = hand(&south_cards);

        // did 0: west holds a club (4) and can follow the trick-2 lead.
        let mut west0_cards: Vec<(u8, u8)> = vec![(SPADE, 3), (SPADE, 4), (CLUB, 4)];
        west0_cards.extend([13u8, 14].map(|r| (HEART, r)));
        west0_cards.extend([13u8, 14].map(|r| (DIAMOND, r)));
        west0_cards.extend((6..=11).map(|r| (SPADE, r)));
        let west0 = hand(&west0_cards);

        // did 1: west is void in clubs, so the same discard is consistent.
        let mut west1_cards: Vec<(u8, u8)> = vec![(SPADE, 3), (SPADE, 4)];
        west1_cards.extend((6..=13).map(|r| (SPADE, r)));
        west1_cards.extend([13u8, 14].map(|r| (HEART, r)));
        west1_cards.push((DIAMOND, 13));
        let west1 = hand(&west1_cards);

        let problem =
            Problem::from_wests(north, south, Strain::NoTrump, 7, vec![west0, west1]).unwrap();

        // Trick 1 (leader west): west leads low, north wins with the ace.
        let mut plays = vec![
            Card::new(SPADE, 3),  // west
            Card::new(SPADE, 14), // north, wins
            Card::new(SPADE, 5),  // east (held by both did's derived east hand)
            Card::new(SPADE, 2),  // south
        ];
        // Trick 2 (leader north): north leads clubs; west discards a spade
        // instead of following, which only did 1 (void in clubs) explains.
        plays.extend([
            Card::new(CLUB, 2),  // north
            Card::new(CLUB, 5),  // east (common club to both derived east hands)
            Card::new(CLUB, 3),  // south
            Card::new(SPADE, 4), // west discards instead of following clubs
        ]);

        let (state, dids) = load_from_history(&problem, &plays).unwrap();
        assert_eq!(state.num_played(), 8);
        assert!(!dids.contains(0));
        assert!(dids.contains(1));
    }

    #[test]
    fn target_still_possible_rejects_when_ew_already_has_too_many() {
        use crate::card::{CLUB, HEART};
        let mut s = State::new(Strain::NoTrump);
        // Trick 1: west leads low clubs, east wins with the ace.
        s.play(Card::new(CLUB, 2)); // west
        s.play(Card::new(CLUB, 3)); // north
        s.play(Card::new(CLUB, 14)); // east
        s.play(Card::new(CLUB, 4)); // south
        // Trick 2: east (on lead) to west, west wins with the ace.
        s.play(Card::new(HEART, 2)); // east
        s.play(Card::new(HEART, 3)); // south
        s.play(Card::new(HEART, 14)); // west
        s.play(Card::new(HEART, 4)); // north
        assert_eq!(s.ew_tricks(), 2);

        assert!(!target_still_possible(&s, 13));
        assert!(target_still_possible(&s, 1));
    }

    #[test]
    fn all_can_win_intersects_across_dids() {
        use crate::card::HEART;
        let problem = trivial_problem();
        let mut oracle = InProcessOracle::new();
        let mut cache = DdsCache::new();
        let mut state = State::new(problem.trump);
        // West leads a heart, north's ace wins it regardless of which of
        // south's low hearts completes the trick; south is on play next.
        state.play(Card::new(HEART, 9));
        state.play(Card::new(HEART, 14));
        state.play(Card::new(HEART, 10));
        assert_eq!(state.to_play(), crate::card::Seat::South);

        let dids = problem.all_dids();
        let winners = all_can_win(&mut cache, &mut oracle, &problem, &mut state, &dids, 13);
        assert_eq!(winners, Hand::parse("-/2345/-/-").unwrap());
        assert_eq!(state.num_played(), 3, "all_can_win must leave state unmutated");
    }

    #[test]
    fn find_usable_plays_ns_groups_winners_by_card() {
        use crate::card::HEART;
        let problem = trivial_problem();
        let mut oracle = InProcessOracle::new();
        let mut cache = DdsCache::new();
        let mut state = State::new(problem.trump);
        state.play(Card::new(HEART, 9));
        state.play(Card::new(HEART, 14));
        state.play(Card::new(HEART, 10));
        assert_eq!(state.to_play(), crate::card::Seat::South);

        let dids = problem.all_dids();
        let upmap =
            find_usable_plays_ns(&mut cache, &mut oracle, &problem, &mut state, &dids, 13);
        // Every one of south's low hearts keeps the single did's target
        // achievable, so each maps to the full did set.
        for did in dids.iter() {
            let mut covered = false;
            for (_card, for_did) in upmap.iter() {
                if for_did.contains(did) {
                    covered = true;
                }
            }
            assert!(covered, "did {did} missing from every card's upmap entry");
        }
        assert_eq!(state.num_played(), 3, "find_usable_plays_ns must leave state unmutated");
    }

    #[test]
    fn filter_achievable_drops_unreachable_dids_keeps_reachable() {
        use crate::card::HEART;
        let problem = trivial_problem();
        let mut oracle = InProcessOracle::new();
        let mut state = State::new(problem.trump);
        state.play(Card::new(HEART, 9));
        state.play(Card::new(HEART, 14));
        state.play(Card::new(HEART, 10));
        state.play(Card::new(HEART, 2));
        assert_eq!(state.ns_tricks(), 1);

        let dids = problem.all_dids();
        let kept = filter_achievable(&mut oracle, &problem, &state, &dids, 13);
        assert_eq!(kept, dids, "single did still on track for all 13 tricks");

        let unreachable = filter_achievable(&mut oracle, &problem, &state, &dids, 14);
        assert!(unreachable.is_empty(), "14 tricks is unreachable for either side");
    }
}
