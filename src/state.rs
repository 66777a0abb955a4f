//! Trick-taking game state: history, whose-turn, trick-winner, canonical key
//! (§4.2, L3).
//!
//! Grounded on `original_source/jade/state.{h,cpp}`. `play`/`undo` are kept
//! strictly LIFO via a private per-play undo log rather than the grounding
//! C++'s recompute-on-undo approach, since Rust's ownership model makes an
//! explicit stack the natural fit; the observable contract (`play(c);
//! undo()` is the identity) is unchanged.

use crate::card::{card_to_handbit, hand_suit_bits, Card, Seat, Strain};

/// One trick-start snapshot needed to reverse a completed trick on `undo`.
#[derive(Copy, Clone)]
struct PlayRecord {
    show_out_before: u8,
    to_play_before: Seat,
    trick_completed: bool,
    ns_before: u8,
    ew_before: u8,
}

/// Mutable search state: everything needed to resume play from a position
/// and to compute a canonical hash of it (§3, §4.2).
pub struct State {
    played: u64,
    history: [Card; 52],
    leader: [Seat; 13],
    num_played: u8,
    ns_tricks: u8,
    ew_tricks: u8,
    to_play: Seat,
    trump: Strain,
    /// 2 bits per suit: bit 0 = NS has shown out of that suit, bit 1 = EW has.
    show_out_status: u8,
    undo_log: Vec<PlayRecord>,
}

impl State {
    /// A fresh state with nothing played, opening leader West (the seat to
    /// declarer's left — South is always declarer, §9).
    pub fn new(trump: Strain) -> State {
        State {
            played: 0,
            history: [Card::new(0, 0); 52],
            leader: [Seat::West; 13],
            num_played: 0,
            ns_tricks: 0,
            ew_tricks: 0,
            to_play: Seat::West,
            trump,
            show_out_status: 0,
            undo_log: Vec::with_capacity(52),
        }
    }

    #[inline]
    pub fn played(&self) -> u64 {
        self.played
    }

    #[inline]
    pub fn num_played(&self) -> u8 {
        self.num_played
    }

    #[inline]
    pub fn ns_tricks(&self) -> u8 {
        self.ns_tricks
    }

    #[inline]
    pub fn ew_tricks(&self) -> u8 {
        self.ew_tricks
    }

    #[inline]
    pub fn to_play(&self) -> Seat {
        self.to_play
    }

    #[inline]
    pub fn trump(&self) -> Strain {
        self.trump
    }

    #[inline]
    pub fn to_play_ns(&self) -> bool {
        self.to_play.is_ns()
    }

    #[inline]
    pub fn to_play_ew(&self) -> bool {
        self.to_play.is_ew()
    }

    /// True iff the current trick has not yet received a card.
    #[inline]
    pub fn new_trick(&self) -> bool {
        self.num_played % 4 == 0
    }

    #[inline]
    pub fn current_trick_num(&self) -> u8 {
        self.num_played / 4
    }

    /// The position (0..3) already played into the current trick.
    #[inline]
    fn trick_pos(&self) -> u8 {
        self.num_played % 4
    }

    /// The seat that led the current (or just-finished) trick.
    pub fn trick_leader(&self) -> Seat {
        self.leader[self.current_trick_num() as usize]
    }

    /// The suit led in the current trick, if a card has already been played.
    pub fn suit_led(&self) -> Option<u8> {
        if self.new_trick() {
            return None;
        }
        let start = (self.current_trick_num() as usize) * 4;
        Some(self.history[start].suit)
    }

    /// The `i`-th card (0..3) played into the current incomplete trick, or
    /// `None` if that seat has not played yet this trick.
    pub fn trick_card(&self, i: u8) -> Option<Card> {
        if i >= self.trick_pos() {
            return None;
        }
        let start = (self.current_trick_num() as usize) * 4;
        Some(self.history[start + i as usize])
    }

    pub fn history(&self) -> &[Card] {
        &self.history[..self.num_played as usize]
    }

    /// Plays `card`, updating trick-winner bookkeeping, show-out flags, and
    /// trick counts. Caller must ensure `card` is legal (held by `to_play`,
    /// not already played, follows suit if able); this is a programmer
    /// invariant, not a user input check.
    pub fn play(&mut self, card: Card) {
        debug_assert!(card.valid(), "attempted to play an invalid card");
        debug_assert!(
            self.played & card_to_handbit(card) == 0,
            "card already played"
        );

        let trick_pos = self.trick_pos();
        let record = PlayRecord {
            show_out_before: self.show_out_status,
            to_play_before: self.to_play,
            trick_completed: false,
            ns_before: self.ns_tricks,
            ew_before: self.ew_tricks,
        };

        if trick_pos == 0 {
            self.leader[self.current_trick_num() as usize] = self.to_play;
        } else if let Some(led) = self.suit_led() {
            if card.suit != led {
                let side_bit = if self.to_play.is_ns() { 1 } else { 2 };
                self.show_out_status |= side_bit << (2 * led);
            }
        }

        self.history[self.num_played as usize] = card;
        self.played |= card_to_handbit(card);
        self.num_played += 1;

        if self.trick_pos() == 0 {
            // Trick just completed.
            let mut rec = record;
            rec.trick_completed = true;
            let trick_num = self.current_trick_num() - 1;
            let winner = self.compute_winner(trick_num);
            if winner.is_ns() {
                self.ns_tricks += 1;
            } else {
                self.ew_tricks += 1;
            }
            self.to_play = winner;
            if (trick_num as usize + 1) < 13 {
                self.leader[trick_num as usize + 1] = winner;
            }
            self.undo_log.push(rec);
        } else {
            self.to_play = self.to_play.left();
            self.undo_log.push(record);
        }
    }

    /// Exact inverse of the most recent `play`. Panics (LIFO violation) if
    /// nothing has been played.
    pub fn undo(&mut self) {
        let record = self
            .undo_log
            .pop()
            .expect("undo() called with no matching play()");
        self.num_played -= 1;
        let card = self.history[self.num_played as usize];
        self.played &= !card_to_handbit(card);
        self.show_out_status = record.show_out_before;
        self.to_play = record.to_play_before;
        if record.trick_completed {
            self.ns_tricks = record.ns_before;
            self.ew_tricks = record.ew_before;
        }
    }

    /// Highest card of the led suit wins unless any trump was played, in
    /// which case the highest trump wins.
    fn compute_winner(&self, trick_num: u8) -> Seat {
        let start = (trick_num as usize) * 4;
        let cards = &self.history[start..start + 4];
        let leader = self.leader[trick_num as usize];
        trick_winner(self.trump, leader, [cards[0], cards[1], cards[2], cards[3]])
    }

    /// Raw 64-bit state key (uncanonicalized): 52 bits of `played` as four
    /// compacted 13-bit suit masks, 7 bits of base-3 show-out digits, 2 bits
    /// of `to_play`, 3 bits of `ew_tricks` (§4.2).
    pub fn to_key(&self) -> u64 {
        let mut played52 = 0u64;
        for suit in 0..4u8 {
            let compact = (hand_suit_bits(self.played, suit) >> 2) as u64;
            played52 = (played52 << 13) | compact;
        }
        let show_out = show_out_base3(self.show_out_status);
        (played52 << 12) | ((show_out as u64) << 5) | ((self.to_play.index() as u64) << 3) | self.ew_tricks as u64
    }

    pub fn show_out_status(&self) -> u8 {
        self.show_out_status
    }
}

/// Trick-winner rule (§4.2), exposed as a free function so callers that
/// track a complete four-card trick outside of a [`State`] (e.g. `crate::host`'s
/// single-deal primitives) don't need a full `State` to resolve it: highest
/// card of the led suit wins unless any trump was played, in which case the
/// highest trump wins. `leader` is the seat that played `cards[0]`.
pub fn trick_winner(trump: Strain, leader: Seat, cards: [Card; 4]) -> Seat {
    let led_suit = cards[0].suit;
    let trump_played = match trump {
        Strain::Suit(t) => cards.iter().any(|c| c.suit == t),
        Strain::NoTrump => false,
    };
    let trump_suit = match trump {
        Strain::Suit(t) => Some(t),
        Strain::NoTrump => None,
    };

    let mut best_pos = 0usize;
    for pos in 1..4 {
        let c = cards[pos];
        let best = cards[best_pos];
        let wins = if trump_played {
            (Some(c.suit) == trump_suit) && (Some(best.suit) != trump_suit || c.rank > best.rank)
        } else {
            c.suit == led_suit && c.rank > best.rank
        };
        if wins {
            best_pos = pos;
        }
    }

    Seat::from_index(leader.index() + best_pos)
}

/// Fold the 8-bit (2-bit-per-suit) show-out flags into a 7-bit base-3 digit
/// sum, one digit per suit: `0`=neither side shown out, `1`=one side,
/// `2`=both. Matches the grounding source's fold exactly (§9).
pub fn show_out_base3(raw: u8) -> u16 {
    let mut out = 0u16;
    for suit in 0..4u32 {
        let digit = ((raw as u32 >> (2 * suit)) % 4) % 3;
        out = out * 3 + digit as u16;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{HEART, SPADE};

    #[test]
    fn play_undo_is_identity() {
        let mut s = State::new(Strain::Suit(SPADE));
        let before_key = s.to_key();
        s.play(Card::new(SPADE, 14));
        assert_ne!(s.to_key(), before_key);
        s.undo();
        assert_eq!(s.to_key(), before_key);
        assert_eq!(s.num_played(), 0);
        assert_eq!(s.to_play(), Seat::West);
    }

    #[test]
    fn full_trick_updates_counts_and_leader() {
        let mut s = State::new(Strain::NoTrump);
        // West leads a low spade, North plays the ace, East and South follow low.
        s.play(Card::new(SPADE, 2)); // West
        s.play(Card::new(SPADE, 14)); // North
        s.play(Card::new(SPADE, 3)); // East
        s.play(Card::new(SPADE, 4)); // South
        assert_eq!(s.num_played(), 4);
        assert_eq!(s.ns_tricks(), 1);
        assert_eq!(s.ew_tricks(), 0);
        assert_eq!(s.to_play(), Seat::North);
        assert_eq!(s.trick_leader(), Seat::North);
        assert!(s.new_trick());
    }

    #[test]
    fn trump_beats_higher_plain_card() {
        let mut s = State::new(Strain::Suit(HEART));
        s.play(Card::new(SPADE, 14)); // West leads ace of spades
        s.play(Card::new(HEART, 2)); // North ruffs with lowest trump
        s.play(Card::new(SPADE, 13));
        s.play(Card::new(SPADE, 12));
        assert_eq!(s.ns_tricks(), 1);
        assert_eq!(s.to_play(), Seat::North);
    }

    #[test]
    fn show_out_recorded_on_discard() {
        let mut s = State::new(Strain::NoTrump);
        s.play(Card::new(SPADE, 2));
        s.play(Card::new(HEART, 2)); // North discards, shows out of spades
        s.play(Card::new(SPADE, 3));
        s.play(Card::new(SPADE, 4));
        assert_ne!(s.show_out_status() & (1 << (2 * SPADE)), 0);
    }

    #[test]
    fn show_out_base3_collapses_both_nonzero_values() {
        // bit0 set (NS shown out of spades) -> raw nibble 1 -> digit 1.
        assert_eq!(show_out_base3(0b01), 1);
        // bit1 set (EW shown out of spades) -> raw nibble 2 -> digit 1 too.
        assert_eq!(show_out_base3(0b10), 1);
        // both bits set -> raw nibble 3 -> digit 2.
        assert_eq!(show_out_base3(0b11), 2);
        assert_eq!(show_out_base3(0), 0);
    }

    #[test]
    fn to_key_distinguishes_ew_tricks_not_ns_tricks() {
        let mut a = State::new(Strain::NoTrump);
        a.play(Card::new(SPADE, 2));
        a.play(Card::new(SPADE, 14));
        a.play(Card::new(SPADE, 3));
        a.play(Card::new(SPADE, 4));
        // Key depends on ew_tricks (bottom 3 bits); after an NS trick it's 0.
        assert_eq!(a.to_key() & 0b111, 0);
    }
}
