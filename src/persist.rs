//! Binary persistence for the BDT manager and [`crate::ansolver::AnSolver`]
//! transposition table, with integrity headers (§4.8, L12).
//!
//! Grounded on `original_source/jade/jadeio.h` and `ansolver.cpp`'s
//! `write_to_file`/`read_from_file`: a flat little-endian record stream,
//! magic-tagged at each nesting level. Per the REDESIGN FLAG on persistence
//! fragility, every record here additionally carries a 2-byte format-version
//! tag right after its magic, counts are always written as fixed-width `u32`
//! (the grounding source uses whatever `size_t`/`int` happen to be on the
//! build host), and a transposition-table entry whose BDT handle exceeds the
//! embedded manager's node count is a rejected file ([`EngineError::DanglingHandle`])
//! rather than undefined behavior on the next lookup.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::ansolver::AnSolver;
use crate::bdt::{BdtManager, Lubdt};
use crate::card::{Hand, Strain};
use crate::error::{EngineError, Result};
use crate::problem::Problem;

const FORMAT_VERSION: u16 = 1;
const BDT_MAGIC: u32 = 0x0031_5722;
const PROBLEM_MAGIC: u32 = 0x1F51_991D;
const ANSOLVER_MAGIC: u32 = 0x0F13_6898;

fn write_u8(w: &mut impl Write, v: u8) -> Result<()> {
    Ok(w.write_all(&[v])?)
}

fn write_u16(w: &mut impl Write, v: u16) -> Result<()> {
    Ok(w.write_all(&v.to_le_bytes())?)
}

fn write_u32(w: &mut impl Write, v: u32) -> Result<()> {
    Ok(w.write_all(&v.to_le_bytes())?)
}

fn write_u64(w: &mut impl Write, v: u64) -> Result<()> {
    Ok(w.write_all(&v.to_le_bytes())?)
}

fn read_exact_or_truncated(r: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => EngineError::TruncatedRecord,
        _ => EngineError::Io(e),
    })
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    read_exact_or_truncated(r, &mut buf)?;
    Ok(buf[0])
}

fn read_u16(r: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    read_exact_or_truncated(r, &mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_or_truncated(r, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact_or_truncated(r, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn write_header(w: &mut impl Write, magic: u32) -> Result<()> {
    write_u32(w, magic)?;
    write_u16(w, FORMAT_VERSION)
}

/// Reads and checks a record's magic, then its version tag (currently
/// accepted unconditionally — there is only one format version so far, but
/// the field exists on disk for a future reader to dispatch on).
fn read_header(r: &mut impl Read, expected_magic: u32) -> Result<u16> {
    let found = read_u32(r)?;
    if found != expected_magic {
        return Err(EngineError::BadHeader { expected: expected_magic, found });
    }
    read_u16(r)
}

/// Serializes `mgr`'s node arena (§4.8): magic, version, node count, then
/// raw `(var, avec, sans)` triples in insertion order.
pub fn write_bdt_manager(w: &mut impl Write, mgr: &BdtManager) -> Result<()> {
    write_header(w, BDT_MAGIC)?;
    let nodes: Vec<_> = mgr.iter_nodes().collect();
    write_u32(w, nodes.len() as u32)?;
    for (var, avec, sans) in nodes {
        write_u32(w, var)?;
        write_u32(w, avec)?;
        write_u32(w, sans)?;
    }
    Ok(())
}

/// Rebuilds a fresh [`BdtManager`] from a node stream written by
/// [`write_bdt_manager`]. Always starts from an empty manager — reloading
/// into a manager that already has nodes is not supported (§4.8).
pub fn read_bdt_manager(r: &mut impl Read) -> Result<BdtManager> {
    read_header(r, BDT_MAGIC)?;
    let count = read_u32(r)?;
    let mut triples = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let var = read_u32(r)?;
        let avec = read_u32(r)?;
        let sans = read_u32(r)?;
        triples.push((var, avec, sans));
    }
    Ok(BdtManager::from_raw_nodes(&triples))
}

/// Serializes a [`Problem`]: magic, version, north/south bits, trump, target,
/// west-hand count, then each west hand (east is re-derived as the deck
/// complement on load, per §4.8).
pub fn write_problem(w: &mut impl Write, problem: &Problem) -> Result<()> {
    write_header(w, PROBLEM_MAGIC)?;
    write_u64(w, problem.north.bits())?;
    write_u64(w, problem.south.bits())?;
    write_u8(w, problem.trump.code())?;
    write_u8(w, problem.target)?;
    write_u32(w, problem.num_dids() as u32)?;
    for west in problem.wests() {
        write_u64(w, west.bits())?;
    }
    Ok(())
}

pub fn read_problem(r: &mut impl Read) -> Result<Problem> {
    read_header(r, PROBLEM_MAGIC)?;
    let north = Hand::from_bits(read_u64(r)?);
    let south = Hand::from_bits(read_u64(r)?);
    let trump = Strain::from_code(read_u8(r)?)?;
    let target = read_u8(r)?;
    let count = read_u32(r)?;
    let mut wests = Vec::with_capacity(count as usize);
    for _ in 0..count {
        wests.push(Hand::from_bits(read_u64(r)?));
    }
    Problem::from_wests(north, south, trump, target, wests)
}

/// Serializes a whole [`AnSolver`]: magic, version, embedded [`Problem`],
/// embedded [`BdtManager`], TT entry count, then `(state_hash, lower, upper)`
/// triples (§4.8).
pub fn write_ansolver(w: &mut impl Write, solver: &AnSolver) -> Result<()> {
    write_header(w, ANSOLVER_MAGIC)?;
    write_problem(w, solver.problem())?;
    write_bdt_manager(w, solver.bdt_mgr())?;
    write_u32(w, solver.tt_len() as u32)?;
    for (&state_hash, lubdt) in solver.tt_iter() {
        write_u64(w, state_hash)?;
        write_u32(w, lubdt.lower)?;
        write_u32(w, lubdt.upper)?;
    }
    Ok(())
}

pub fn read_ansolver(r: &mut impl Read) -> Result<AnSolver> {
    read_header(r, ANSOLVER_MAGIC)?;
    let problem = read_problem(r)?;
    let bdt_mgr = read_bdt_manager(r)?;
    let node_count = bdt_mgr.node_count() as u32;

    let tt_count = read_u32(r)?;
    let mut tt = HashMap::with_capacity(tt_count as usize);
    for _ in 0..tt_count {
        let state_hash = read_u64(r)?;
        let lower = read_u32(r)?;
        let upper = read_u32(r)?;
        if lower > node_count || upper > node_count {
            return Err(EngineError::DanglingHandle(lower.max(upper)));
        }
        tt.insert(state_hash, Lubdt::new(lower, upper));
    }

    Ok(AnSolver::from_parts(problem, bdt_mgr, tt))
}

pub fn write_ansolver_to_file(path: &Path, solver: &AnSolver) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write_ansolver(&mut w, solver)?;
    w.flush()?;
    Ok(())
}

pub fn read_ansolver_from_file(path: &Path) -> Result<AnSolver> {
    let mut r = BufReader::new(File::open(path)?);
    read_ansolver(&mut r)
}
