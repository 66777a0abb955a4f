//! Error taxonomy for the declarer-play analyzer.
//!
//! Input validation and persistence failures are ordinary `Result` values;
//! programmer-invariant violations (corrupt search state, out-of-range BDT
//! handles, LIFO undo violations) use `assert!`/`debug_assert!` and abort,
//! matching the invariant-checking style already used in [`crate::dd_oracle`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid hand string: {0}")]
    ParseHand(String),

    #[error("invalid card string: {0}")]
    ParseCard(String),

    #[error("invalid direction: {0}")]
    InvalidDirection(String),

    #[error("invalid strain: {0}")]
    InvalidStrain(String),

    #[error("invalid problem: {0}")]
    ProblemConstruction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad file header: expected {expected:#010x}, found {found:#010x}")]
    BadHeader { expected: u32, found: u32 },

    #[error("transposition table entry references unknown BDT handle {0}")]
    DanglingHandle(u32),

    #[error("truncated or corrupt record")]
    TruncatedRecord,

    #[error("double-dummy oracle failure: {0}")]
    OracleFailure(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
