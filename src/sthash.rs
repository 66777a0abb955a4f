//! Canonical state hasher: collapses defender small-card permutations so
//! strategically-equivalent states collide in the transposition table (§4.3,
//! L9).
//!
//! Grounded on `original_source/jade/sthash.{h,cpp}`. The grounding source's
//! `hash()` indexes its per-suit table directly with the full 16-bit
//! `hand_suit_bits` value (0..0x7FFC) against a table sized `1<<13`, which is
//! an out-of-bounds access for any played-pattern above 0x1FFC — the
//! precompute loop and the lookup disagree about whether the index is
//! pre-shifted. §4.3 resolves this by shifting at both ends; this port does
//! the same: the table is addressed by `raw_played_bits >> 2` everywhere.

use crate::card::hand_suit_bits;
use crate::problem::Problem;
use crate::state::State;

const TBL_SIZE: usize = 1 << 13;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Owner {
    North,
    South,
    Def,
    Used,
}

/// Precomputed per-suit canonicalization table plus the fixed north/south
/// holdings it was built against.
pub struct StateHasher {
    tbl: [Vec<u16>; 4],
}

impl StateHasher {
    /// Builds the four `2^13`-entry canonicalization tables for `problem`'s
    /// fixed North/South hands. Expensive only once per Solver/ANSolver
    /// instance.
    pub fn new(problem: &Problem) -> StateHasher {
        let mut tbl: [Vec<u16>; 4] = Default::default();
        for suit in 0..4u8 {
            let mut t = Vec::with_capacity(TBL_SIZE);
            for bits in 0..TBL_SIZE as u16 {
                t.push(compute_one(problem, suit, bits << 2));
            }
            tbl[suit as usize] = t;
        }
        StateHasher { tbl }
    }

    /// The canonical 64-bit hash of `state`: four canonicalized 13-bit
    /// suit-played patterns, then the show-out base-3 digit sum, then
    /// `to_play`, then `ew_tricks` — same layout as [`State::to_key`] but
    /// with canonicalized played-bits.
    pub fn hash(&self, state: &State) -> u64 {
        let mut out: u64 = 0;
        for suit in 0..4u8 {
            out <<= 13;
            let suit_played = hand_suit_bits(state.played(), suit);
            out |= self.tbl[suit as usize][(suit_played >> 2) as usize] as u64;
        }

        let show_out = crate::state::show_out_base3(state.show_out_status());
        out <<= 7;
        out |= show_out as u64;

        out <<= 2;
        out |= state.to_play().index() as u64;

        out <<= 3;
        out |= state.ew_tricks() as u64;

        out
    }

    /// Decode and pretty-print a hash for diagnostics.
    pub fn hash_to_string(h: u64) -> String {
        let ew_tricks = h & 0x7;
        let to_play = (h >> 3) & 0x3;
        let show_out = (h >> 5) & 0x7f;
        let played = h >> 12;
        format!(
            "played={played:013x} show_out={show_out} to_play={to_play} ew_tricks={ew_tricks}"
        )
    }
}

/// Canonicalizes the 13-bit `played` pattern (already the full 16-bit
/// `hand_suit_bits` shape, i.e. bit `4 << rank_idx`) for one suit, given the
/// fixed north/south holdings from `problem`. Ports `STATE_HASHER::compute_one`
/// exactly.
fn compute_one(problem: &Problem, suit: u8, played: u16) -> u16 {
    let north = hand_suit_bits(problem.north.bits(), suit);
    let south = hand_suit_bits(problem.south.bits(), suit);

    let mut owners = [Owner::Def; 13];
    for (i, owner) in owners.iter_mut().enumerate() {
        let bit: u16 = 4 << i;
        *owner = if bit & played != 0 {
            Owner::Used
        } else if bit & north != 0 {
            Owner::North
        } else if bit & south != 0 {
            Owner::South
        } else {
            Owner::Def
        };
    }

    let mut start = 0usize;
    let mut not_used: u16 = 0;
    while start < 13 {
        let mut end = start;
        while end < 13 && owners[end] != Owner::Def {
            end += 1;
        }

        // Within the slice start <= x < end, find the lowest unplayed card
        // (x) and shift that down to the lowest index (y) for that player.
        let mut y = start;
        let mut x = start;
        while x < end {
            let find_in = match owners[x] {
                Owner::North => north,
                Owner::South => south,
                Owner::Used => {
                    x += 1;
                    continue;
                }
                Owner::Def => unreachable!("slice boundary cannot be DEF"),
            };

            while find_in & (4 << y) == 0 {
                debug_assert!(y <= x, "state hasher slice underflow");
                y += 1;
            }
            not_used |= 4 << y;
            x += 1;
            y += 1;
        }

        debug_assert!(x <= end);
        if end < 13 {
            not_used |= 4 << end;
        }
        start = end + 1;
    }

    0x7ffc ^ not_used
}
