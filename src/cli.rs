//! Command-line interface for the gridmatch demo driver.

use clap::{Parser, Subcommand, ValueEnum};

/// Gridmatch - two-player networked tic-tac-toe core.
#[derive(Debug, Parser)]
#[command(name = "gridmatch", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play a scripted match between two simulated clients over the
    /// in-memory store and print boards and settled stats.
    Demo {
        /// How the scripted match ends.
        #[arg(long, value_enum, default_value_t = Scenario::Win)]
        scenario: Scenario,
    },
}

/// Ending of the scripted demo match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// X takes the top row.
    Win,
    /// The board fills with no line.
    Draw,
    /// O concedes after two moves.
    Resign,
}
