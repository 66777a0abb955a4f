//! Host API surface (§6, L15): the stable, string/primitive-friendly
//! operations a language binding wraps directly, built on top of the
//! in-process oracle (`crate::dd_oracle`) rather than the did-indexed
//! `Problem`/`Solver`/`AnSolver` machinery — every operation here concerns a
//! single, fully known deal (or a single partial position within one), not a
//! family of hypothesized layouts.
//!
//! Grounded on `original_source/dds/Python.cpp`'s `solve_deal`,
//! `solve_many_deals`, `solve_many_plays`, `analyze_deal_play`, and
//! `play_menu` bindings, re-expressed against this crate's own `dd_oracle`
//! engine instead of Bo Haglund's DDS (§4.5a).

use crate::card::{Card, Hand, Seat, Strain};
use crate::dd_oracle::{Hands as OracleHands, PartialTrick, Solver as OracleSolver};
use crate::dds::{hand_to_oracle_cards, legal_plays, to_oracle_card, to_oracle_seat, MAXNOOFBOARDS};
use crate::error::{EngineError, Result};
use crate::state::trick_winner;

/// A fully known, validated 52-card deal (host API's "Deal" object).
///
/// Internally stored West,North,East,South to match the host API's own
/// 4-tuple ordering for partial hands ("starting with West", §6).
#[derive(Copy, Clone, Debug)]
pub struct Deal {
    hands: [Hand; 4],
}

impl Deal {
    pub fn new(west: Hand, north: Hand, east: Hand, south: Hand) -> Result<Deal> {
        let hands = [west, north, east, south];
        let mut seen = 0u64;
        for &h in &hands {
            if h.size() != 13 {
                return Err(EngineError::ProblemConstruction(format!(
                    "deal hand has {} cards, expected 13",
                    h.size()
                )));
            }
            if seen & h.bits() != 0 {
                return Err(EngineError::ProblemConstruction(
                    "deal hands overlap".to_string(),
                ));
            }
            seen |= h.bits();
        }
        Ok(Deal { hands })
    }

    pub fn hand(&self, seat: Seat) -> Hand {
        self.hands[seat.index()]
    }

    fn oracle_hands(&self) -> OracleHands {
        let mut out = OracleHands::new();
        for &seat in &Seat::ALL {
            *out.hand_mut(to_oracle_seat(seat)) = hand_to_oracle_cards(self.hand(seat));
        }
        out
    }
}

/// `solve_deal` (§6): tricks declarer makes with optimal play by both sides,
/// leading from declarer's left (§9's `+1 mod 4` resolution).
pub fn solve_deal(deal: &Deal, declarer: Seat, strain: Strain) -> u8 {
    let leader = declarer.left();
    let solver = OracleSolver::new(deal.oracle_hands(), strain.code() as usize, to_oracle_seat(leader));
    let ns_tricks = solver.solve();
    if declarer.is_ns() {
        ns_tricks
    } else {
        13 - ns_tricks
    }
}

/// `solve_many_deals` (§6): batches transparently at [`MAXNOOFBOARDS`]-sized
/// chunks, same as a real external DDS binding would, though the in-process
/// oracle has no real batch limit of its own (§4.5).
pub fn solve_many_deals(deals: &[(Deal, Seat, Strain)]) -> Vec<u8> {
    deals
        .chunks(MAXNOOFBOARDS)
        .flat_map(|chunk| chunk.iter().map(|(deal, declarer, strain)| solve_deal(deal, *declarer, *strain)))
        .collect()
}

/// One candidate play and the resulting trick count for the side on play,
/// counted from that side's point of view (§6's `solve_many_plays`/`play_menu`
/// result shape).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CardScore {
    pub card: Card,
    pub tricks: u8,
}

fn build_partial_trick(trick_so_far: &[Card], on_play: Seat) -> Result<(PartialTrick, Seat)> {
    if trick_so_far.len() > 3 {
        return Err(EngineError::ProblemConstruction(
            "trick-so-far carries more than 3 cards".to_string(),
        ));
    }
    let leader = Seat::from_index(on_play.index() + 4 - trick_so_far.len());
    let mut pt = PartialTrick::new();
    for (i, &card) in trick_so_far.iter().enumerate() {
        let seat = Seat::from_index(leader.index() + i);
        pt.add(to_oracle_card(card), to_oracle_seat(seat));
    }
    Ok((pt, leader))
}

fn remove_from(hands: &[Hand; 4], seat: Seat, card: Card) -> [Hand; 4] {
    let mut out = *hands;
    out[seat.index()] = Hand::from_bits(out[seat.index()].bits() & !crate::card::card_to_handbit(card));
    out
}

fn oracle_hands_of(hands: &[Hand; 4]) -> OracleHands {
    let mut out = OracleHands::new();
    for &seat in &Seat::ALL {
        *out.hand_mut(to_oracle_seat(seat)) = hand_to_oracle_cards(hands[seat.index()]);
    }
    out
}

/// Plays every legal card for `on_play` from this position and scores the
/// resulting line for the side on play, sharing the trick-resolution and
/// continuation logic `solve_many_plays`, `analyze_deal_play`, and
/// `play_menu` all need.
fn score_candidates(
    hands: &[Hand; 4],
    on_play: Seat,
    strain: Strain,
    trick_so_far: &[Card],
) -> Result<Vec<CardScore>> {
    let suit_led = trick_so_far.first().map(|c| c.suit);
    let remaining_before = hands[on_play.index()].size() as u8;
    let candidates = legal_plays(hands[on_play.index()], suit_led);

    let mut out = Vec::new();
    for card in candidates.iter() {
        let after_hands = remove_from(hands, on_play, card);

        let total_ns = if trick_so_far.len() == 3 {
            let (_partial, leader) = build_partial_trick(trick_so_far, on_play)?;
            let mut full = [Card::new(0, 0); 4];
            for (i, &c) in trick_so_far.iter().enumerate() {
                full[i] = c;
            }
            full[3] = card;
            let winner = trick_winner(strain, leader, full);
            let trick_award = u8::from(winner.is_ns());

            if after_hands[on_play.index()].size() == 0 {
                trick_award
            } else {
                let solver = OracleSolver::new(oracle_hands_of(&after_hands), strain.code() as usize, to_oracle_seat(winner));
                trick_award + solver.solve()
            }
        } else {
            let (mut partial, _leader) = build_partial_trick(trick_so_far, on_play)?;
            partial.add(to_oracle_card(card), to_oracle_seat(on_play));
            let solver = OracleSolver::new_mid_trick(oracle_hands_of(&after_hands), strain.code() as usize, &partial)
                .expect("partial trick built from 1..=3 plays is always valid for new_mid_trick");
            solver.solve_mid_trick(
                &mut crate::dd_oracle::CutoffCache::new(16),
                &mut crate::dd_oracle::PatternCache::new(16),
                &partial,
            )
        };

        let tricks = if on_play.is_ns() {
            total_ns
        } else {
            remaining_before - total_ns
        };
        out.push(CardScore { card, tricks });
    }
    out.sort_by_key(|cs| cs.card);
    Ok(out)
}

/// `solve_many_plays` (§6), without the optional win-rank string (see
/// [`solve_many_plays_with_win_ranks`]): `hands` is indexed West, North,
/// East, South, matching the host API's 4-tuple order.
pub fn solve_many_plays(
    hands: [Hand; 4],
    on_play: Seat,
    strain: Strain,
    trick_so_far: &[Card],
) -> Result<Vec<CardScore>> {
    score_candidates(&hands, on_play, strain, trick_so_far)
}

/// `solve_many_plays` with `want_win_ranks = true`. Per suit, the DDS
/// contract is "one below the lowest win rank" (SHDC order), or `'A'` if the
/// suit has no such rank. We approximate it from the candidates already
/// scored: among `on_play`'s cards of a suit, the lowest-ranked one that
/// reaches the suit's best score sets the boundary; the char reported is the
/// rank one below it (or `'A'` if the lowest card of the suit already is the
/// boundary, i.e. there is nothing below it to report).
pub fn solve_many_plays_with_win_ranks(
    hands: [Hand; 4],
    on_play: Seat,
    strain: Strain,
    trick_so_far: &[Card],
) -> Result<(Vec<CardScore>, String)> {
    let scored = score_candidates(&hands, on_play, strain, trick_so_far)?;
    let mut win_ranks = String::with_capacity(4);
    for suit in 0..4u8 {
        let mut in_suit: Vec<CardScore> = scored.iter().copied().filter(|cs| cs.card.suit == suit).collect();
        in_suit.sort_by_key(|cs| cs.card.rank);
        let best = in_suit.iter().map(|cs| cs.tricks).max();
        let boundary = match best {
            Some(best) => in_suit.iter().find(|cs| cs.tricks == best).map(|cs| cs.card.rank),
            None => None,
        };
        let ch = match boundary {
            Some(rank) if rank > 2 => crate::card::Card::new(suit, rank - 1).to_string_compact().chars().nth(1).unwrap(),
            _ => 'A',
        };
        win_ranks.push(ch);
    }
    Ok((scored, win_ranks))
}

/// `play_menu` (§6): legal moves for `on_play`, grouped into equivalence
/// classes (cards that score identically from this position).
pub fn play_menu(hands: [Hand; 4], on_play: Seat, strain: Strain, trick_so_far: &[Card]) -> Result<Vec<Vec<Card>>> {
    let scored = score_candidates(&hands, on_play, strain, trick_so_far)?;
    let mut groups: Vec<(u8, Vec<Card>)> = Vec::new();
    for cs in scored {
        if let Some(group) = groups.iter_mut().find(|(tricks, _)| *tricks == cs.tricks) {
            group.1.push(cs.card);
        } else {
            groups.push((cs.tricks, vec![cs.card]));
        }
    }
    groups.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(groups.into_iter().map(|(_, cards)| cards).collect())
}

/// One play's annotation (§6's `analyze_deal_play`): how many of the legal
/// plays available at that point were equally good (`num_good`), how many
/// were strictly worse (`num_bad`), and whether the play actually made was
/// among the good ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlayAnnotation {
    pub num_good: u32,
    pub num_bad: u32,
    pub was_good: bool,
}

/// `analyze_deal_play` (§6): walks `history` from the opening lead,
/// classifying each play against every legal alternative available to the
/// player on turn at that point.
pub fn analyze_deal_play(deal: &Deal, declarer: Seat, strain: Strain, history: &[Card]) -> Result<Vec<PlayAnnotation>> {
    let mut hands = [deal.hand(Seat::West), deal.hand(Seat::North), deal.hand(Seat::East), deal.hand(Seat::South)];
    let mut on_play = declarer.left();
    let mut trick_so_far: Vec<Card> = Vec::new();
    let mut out = Vec::with_capacity(history.len());

    for &played in history {
        if !hands[on_play.index()].contains(played) {
            return Err(EngineError::ProblemConstruction(format!(
                "history plays {played} which {on_play} does not hold"
            )));
        }

        let scored = score_candidates(&hands, on_play, strain, &trick_so_far)?;
        let best = scored.iter().map(|cs| cs.tricks).max().unwrap_or(0);
        let num_good = scored.iter().filter(|cs| cs.tricks == best).count() as u32;
        let num_bad = scored.len() as u32 - num_good;
        let was_good = scored
            .iter()
            .find(|cs| cs.card == played)
            .map(|cs| cs.tricks == best)
            .unwrap_or(false);
        out.push(PlayAnnotation { num_good, num_bad, was_good });

        hands[on_play.index()] = Hand::from_bits(hands[on_play.index()].bits() & !crate::card::card_to_handbit(played));
        trick_so_far.push(played);
        if trick_so_far.len() == 4 {
            let leader = Seat::from_index(on_play.index() + 1);
            let mut full = [Card::new(0, 0); 4];
            full.copy_from_slice(&trick_so_far);
            on_play = trick_winner(strain, leader, full);
            trick_so_far.clear();
        } else {
            on_play = on_play.left();
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Strain, SPADE};

    fn trivial_deal() -> Deal {
        let north = Hand::parse("AKQJ/AKQJ/AKQJ/A").unwrap();
        let south = Hand::parse("2345/2345/2345/2").unwrap();
        let west = Hand::parse("6789/6789/6789/3").unwrap();
        let known = north.union(south).union(west);
        let east = Hand::from_bits(crate::card::ALL_CARDS_BITS & !known.bits());
        Deal::new(west, north, east, south).unwrap()
    }

    #[test]
    fn solve_deal_agrees_for_ns_and_ew_declarer() {
        let deal = trivial_deal();
        assert_eq!(solve_deal(&deal, Seat::South, Strain::Suit(SPADE)), 13);
        assert_eq!(solve_deal(&deal, Seat::North, Strain::Suit(SPADE)), 13);
        assert_eq!(solve_deal(&deal, Seat::East, Strain::Suit(SPADE)), 0);
        assert_eq!(solve_deal(&deal, Seat::West, Strain::Suit(SPADE)), 0);
    }

    #[test]
    fn solve_many_deals_matches_solve_deal_one_at_a_time() {
        let deal = trivial_deal();
        let batch = vec![(deal, Seat::South, Strain::Suit(SPADE)); 3];
        let results = solve_many_deals(&batch);
        assert_eq!(results, vec![13, 13, 13]);
    }

    #[test]
    fn deal_rejects_overlapping_hands() {
        let north = Hand::parse("AKQJ/AKQJ/AKQJ/A").unwrap();
        assert!(Deal::new(north, north, north, north).is_err());
    }

    #[test]
    fn play_menu_groups_equal_scoring_cards_together() {
        let deal = trivial_deal();
        let hands = [deal.hand(Seat::West), deal.hand(Seat::North), deal.hand(Seat::East), deal.hand(Seat::South)];
        let groups = play_menu(hands, Seat::South, Strain::Suit(SPADE), &[]).unwrap();
        // South is on lead with nothing but low trumps opposite a solid
        // trump suit: every spade is equally winning.
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
    }

    #[test]
    fn solve_many_plays_reports_tricks_from_on_plays_perspective() {
        let deal = trivial_deal();
        let hands = [deal.hand(Seat::West), deal.hand(Seat::North), deal.hand(Seat::East), deal.hand(Seat::South)];
        let scored = solve_many_plays(hands, Seat::South, Strain::Suit(SPADE), &[]).unwrap();
        assert!(scored.iter().all(|cs| cs.tricks == 13));
    }

    #[test]
    fn analyze_deal_play_covers_one_full_trick() {
        let deal = trivial_deal();
        // West (opening leader, declarer South's left) to North to East to
        // South; every spade in play wins every remaining trick, so every
        // legal card at each step is equally good.
        let history = vec![
            Card::new(SPADE, 6),
            Card::new(SPADE, 11), // north: jack
            Card::new(SPADE, 10), // east's only spade
            Card::new(SPADE, 2),
        ];
        let annotations = analyze_deal_play(&deal, Seat::South, Strain::Suit(SPADE), &history).unwrap();
        assert_eq!(annotations.len(), 4);
        for a in &annotations {
            assert!(a.was_good);
            assert_eq!(a.num_bad, 0);
        }
    }
}
