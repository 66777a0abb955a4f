//! `anbridge` — command-line front-end over the declarer-play analyzer's
//! host API (§6a), in the subcommand style of
//! `Rick-Wilson-Bridge-Parsers::main`: one `Cli`/`Commands` pair, each
//! subcommand a thin wrapper that parses its string arguments and calls
//! straight into the library.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use declarer_analyzer::card::{Card, Hand, Seat, Strain};
use declarer_analyzer::host::{self, Deal};
use declarer_analyzer::{AnSolver, DeclarerSolver, Problem};

#[derive(Parser)]
#[command(name = "anbridge")]
#[command(about = "Declarer-play analyzer: joint-layout double-dummy search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Does a single declarer line make the contract against every
    /// hypothesized (West, East) layout at once?
    Solve {
        /// North's hand, e.g. "AKQ2/AKQ2/AKQ2/AK"
        #[arg(long)]
        north: String,

        /// South's hand
        #[arg(long)]
        south: String,

        /// Trump strain: C, D, H, S, or N
        #[arg(long)]
        trump: String,

        /// Trick target (1..=13)
        #[arg(long)]
        target: u8,

        /// File of candidate (West, East) layouts, one pair per line,
        /// hand strings separated by whitespace
        #[arg(long)]
        layouts: PathBuf,

        /// Also print the existential solver's winnable-subset cubes
        #[arg(long)]
        cubes: bool,
    },

    /// Annotates a play history against a single fully known deal.
    Analyze {
        /// North's hand
        #[arg(long)]
        north: String,
        /// South's hand
        #[arg(long)]
        south: String,
        /// East's hand
        #[arg(long)]
        east: String,
        /// West's hand
        #[arg(long)]
        west: String,

        /// Declarer: W, N, E, or S
        #[arg(long)]
        declarer: String,

        /// Trump strain: C, D, H, S, or N
        #[arg(long)]
        strain: String,

        /// Compressed play history, e.g. "S4SJSQSAC4D2CKC5"
        #[arg(long)]
        play: String,
    },

    /// Reloads a persisted ANSolver and re-evaluates a history, for
    /// regression-checking a dump against a fresh run.
    Dump {
        /// Path to a file written by `AnSolver::write_to_file`
        #[arg(long)]
        ansolver: PathBuf,

        /// Compressed play history to re-evaluate
        #[arg(long, default_value = "")]
        history: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Solve { north, south, trump, target, layouts, cubes } => {
            solve(&north, &south, &trump, target, &layouts, cubes)
        }
        Commands::Analyze { north, south, east, west, declarer, strain, play } => {
            analyze(&north, &south, &east, &west, &declarer, &strain, &play)
        }
        Commands::Dump { ansolver, history } => dump(&ansolver, &history),
    }
}

fn parse_layouts(path: &PathBuf) -> Result<Vec<(Hand, Hand)>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading layouts file {}", path.display()))?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.split_whitespace();
            let west = parts.next().context("layout line missing west hand")?;
            let east = parts.next().context("layout line missing east hand")?;
            let west = Hand::parse(west).context("parsing west hand")?;
            let east = Hand::parse(east).context("parsing east hand")?;
            Ok((west, east))
        })
        .collect()
}

fn solve(north: &str, south: &str, trump: &str, target: u8, layouts: &PathBuf, cubes: bool) -> Result<()> {
    let north = Hand::parse(north).context("parsing north")?;
    let south = Hand::parse(south).context("parsing south")?;
    let trump = Strain::parse(trump).context("parsing trump")?;
    let layouts = parse_layouts(layouts)?;
    let problem = Problem::new(north, south, trump, target, layouts).context("constructing problem")?;

    let mut an_solver = AnSolver::new(problem.clone());
    let makes = an_solver.eval(&[]).context("evaluating ANSolver")?;
    println!("single line makes target: {makes}");

    if cubes {
        let mut solver = DeclarerSolver::new(problem);
        let bdt = solver.eval(&[]).context("evaluating Solver")?;
        let cubes = solver.bdt_mgr().get_cubes(bdt);
        println!("jointly-solvable did subsets:");
        for cube in cubes {
            let dids: Vec<String> = cube.iter().map(|d| d.to_string()).collect();
            println!("  {{{}}}", dids.join(", "));
        }
    }
    Ok(())
}

fn analyze(north: &str, south: &str, east: &str, west: &str, declarer: &str, strain: &str, play: &str) -> Result<()> {
    let north = Hand::parse(north).context("parsing north")?;
    let south = Hand::parse(south).context("parsing south")?;
    let east = Hand::parse(east).context("parsing east")?;
    let west = Hand::parse(west).context("parsing west")?;
    let deal = Deal::new(west, north, east, south).context("constructing deal")?;
    let declarer = Seat::parse(declarer).context("parsing declarer")?;
    let strain = Strain::parse(strain).context("parsing strain")?;
    let history = Card::parse_compressed(play).context("parsing play history")?;

    let annotations = host::analyze_deal_play(&deal, declarer, strain, &history).context("analyzing play")?;
    for (card, a) in history.iter().zip(annotations.iter()) {
        println!(
            "{card}: {} ({} good, {} bad)",
            if a.was_good { "good" } else { "bad" },
            a.num_good,
            a.num_bad
        );
    }
    Ok(())
}

fn dump(ansolver: &PathBuf, history: &str) -> Result<()> {
    let mut solver =
        declarer_analyzer::persist::read_ansolver_from_file(ansolver).context("reading persisted ANSolver")?;
    let history = Card::parse_compressed(history).context("parsing history")?;
    let makes = solver.eval(&history).context("re-evaluating ANSolver")?;
    println!("single line makes target: {makes}");
    println!("stats: {:?}", solver.get_stats());
    Ok(())
}
