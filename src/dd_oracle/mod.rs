//! In-process single-dummy solver used as this crate's double-dummy oracle backend.
//!
//! This module is the alpha-beta / MTD(f) minimax engine this crate was built
//! from: given one fully fixed deal, a trump, and a seat on lead, it computes
//! how many tricks declarer makes. The joint-layout ZDD search in
//! [`crate::ansolver`] and [`crate::solver`] batches many such single-deal
//! queries through [`crate::dds`], which wraps [`Solver`] behind the
//! `SingleDummyOracle` trait boundary.

pub mod cards;
mod convert;
mod engine;
mod hands;
mod pattern;
mod play;
mod search;
pub mod types;

pub use cards::Cards;
pub use convert::{direction_to_seat, seat_to_direction};
pub use engine::{
    get_node_count, order_follows, order_leads, set_no_pruning, set_no_rank_skip, set_no_tt,
    set_show_perf, set_xray_limit, OrderedCards, PartialTrick, PlayedCard, Solver,
};
pub use hands::Hands;
pub use pattern::PatternCache;
pub use search::{slow_trump_tricks_opponent, CutoffCache};
pub use types::{Seat, Suit, NOTRUMP, NUM_RANKS, NUM_SEATS, NUM_SUITS, TOTAL_CARDS, TOTAL_TRICKS};
pub use types::{CLUB, DIAMOND, HEART, SPADE};
pub use types::{EAST, NORTH, SOUTH, WEST};

#[cfg(test)]
mod tests;
