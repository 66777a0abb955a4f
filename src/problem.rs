//! Immutable problem definition (§3, L4).
//!
//! Grounded on `original_source/jade/problem.{h,cpp}`. Declarer is always
//! South, dummy is always North (§9's "lucky coincidence" resolution): the
//! opening leader is `(declarer + 1) % 4 == West`, matching
//! [`crate::state::State::new`]'s fixed starting seat.

use crate::card::{handbits_count, Hand, Seat, Strain, ALL_CARDS_BITS};
use crate::error::{EngineError, Result};

/// One hypothesized (West, East) layout, indexed by its position in
/// [`Problem::wests`]/[`Problem::easts`] (the "did").
#[derive(Copy, Clone, Debug)]
pub struct Layout {
    pub west: Hand,
    pub east: Hand,
}

/// Immutable input to a [`crate::solver::Solver`] or
/// [`crate::ansolver::AnSolver`]: the fixed declarer/dummy hands, strain,
/// trick target, and a list of hypothesized opposing layouts.
#[derive(Clone, Debug)]
pub struct Problem {
    pub north: Hand,
    pub south: Hand,
    pub trump: Strain,
    pub target: u8,
    wests: Vec<Hand>,
    easts: Vec<Hand>,
}

impl Problem {
    /// Declarer is always South; see module docs.
    pub const DECLARER: Seat = Seat::South;
    /// Dummy is always North.
    pub const DUMMY: Seat = Seat::North;

    pub fn new(
        north: Hand,
        south: Hand,
        trump: Strain,
        target: u8,
        layouts: Vec<(Hand, Hand)>,
    ) -> Result<Problem> {
        if north.bits() & !ALL_CARDS_BITS != 0 || south.bits() & !ALL_CARDS_BITS != 0 {
            return Err(EngineError::ProblemConstruction(
                "hand bits outside the legal deck".into(),
            ));
        }
        if handbits_count(north.bits()) != 13 || handbits_count(south.bits()) != 13 {
            return Err(EngineError::ProblemConstruction(
                "north and south must each hold exactly 13 cards".into(),
            ));
        }
        if !north.is_disjoint(south) {
            return Err(EngineError::ProblemConstruction(
                "north and south hands overlap".into(),
            ));
        }
        if target < 1 || target > 13 {
            return Err(EngineError::ProblemConstruction(format!(
                "target {target} out of range 1..=13"
            )));
        }
        if layouts.is_empty() {
            return Err(EngineError::ProblemConstruction(
                "at least one (west, east) layout is required".into(),
            ));
        }

        let mut wests = Vec::with_capacity(layouts.len());
        let mut easts = Vec::with_capacity(layouts.len());
        for (did, (west, east)) in layouts.into_iter().enumerate() {
            if handbits_count(west.bits()) != 13 || handbits_count(east.bits()) != 13 {
                return Err(EngineError::ProblemConstruction(format!(
                    "layout {did}: west/east must each hold exactly 13 cards"
                )));
            }
            if !west.is_disjoint(east)
                || !west.is_disjoint(north)
                || !west.is_disjoint(south)
                || !east.is_disjoint(north)
                || !east.is_disjoint(south)
            {
                return Err(EngineError::ProblemConstruction(format!(
                    "layout {did}: west/east overlap with each other or with north/south"
                )));
            }
            wests.push(west);
            easts.push(east);
        }

        Ok(Problem {
            north,
            south,
            trump,
            target,
            wests,
            easts,
        })
    }

    /// Construct from north/south/trump/target plus just the west hands;
    /// each east hand is derived as the deck complement (used by
    /// persistence — §4.8 stores only `wests[]`).
    pub fn from_wests(
        north: Hand,
        south: Hand,
        trump: Strain,
        target: u8,
        wests: Vec<Hand>,
    ) -> Result<Problem> {
        let known = north.union(south);
        let layouts = wests
            .into_iter()
            .map(|west| {
                let east = Hand::from_bits(ALL_CARDS_BITS & !(west.bits() | known.bits()));
                (west, east)
            })
            .collect();
        Problem::new(north, south, trump, target, layouts)
    }

    pub fn num_dids(&self) -> usize {
        self.wests.len()
    }

    pub fn west(&self, did: u32) -> Hand {
        self.wests[did as usize]
    }

    pub fn east(&self, did: u32) -> Hand {
        self.easts[did as usize]
    }

    pub fn wests(&self) -> &[Hand] {
        &self.wests
    }

    pub fn easts(&self) -> &[Hand] {
        &self.easts
    }

    pub fn all_dids(&self) -> crate::intset::IntSet {
        crate::intset::IntSet::full_set(self.num_dids() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hands() -> (Hand, Hand, Hand, Hand) {
        (
            Hand::parse("AKQ2/AKQ2/AKQ2/AK").unwrap(),
            Hand::parse("543/543/543/2345").unwrap(),
            Hand::parse("JT98/JT98/JT98/67").unwrap(),
            Hand::parse("76/76/76/89T").unwrap(),
        )
    }

    #[test]
    fn constructs_with_valid_disjoint_hands() {
        let (n, s, w, e) = hands();
        let p = Problem::new(n, s, Strain::NoTrump, 12, vec![(w, e)]).unwrap();
        assert_eq!(p.num_dids(), 1);
        assert_eq!(p.west(0), w);
        assert_eq!(p.east(0), e);
    }

    #[test]
    fn rejects_overlapping_hands() {
        let (n, s, w, _e) = hands();
        let err = Problem::new(n, s, Strain::NoTrump, 12, vec![(w, n)]);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_target_out_of_range() {
        let (n, s, w, e) = hands();
        assert!(Problem::new(n, s, Strain::NoTrump, 0, vec![(w, e)]).is_err());
        assert!(Problem::new(n, s, Strain::NoTrump, 14, vec![(w, e)]).is_err());
    }

    #[test]
    fn from_wests_derives_east_as_complement() {
        let (n, s, w, e) = hands();
        let p = Problem::from_wests(n, s, Strain::NoTrump, 12, vec![w]).unwrap();
        assert_eq!(p.east(0), e);
    }

    #[test]
    fn declarer_is_south_leader_is_west() {
        assert_eq!(Problem::DECLARER, Seat::South);
        assert_eq!(Problem::DECLARER.left(), Seat::West);
        assert_eq!(Problem::DUMMY, Seat::North);
    }
}
