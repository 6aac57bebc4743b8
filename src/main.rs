//! Gridmatch demo driver.
//!
//! Runs a scripted two-player match against the in-memory store so the
//! whole pipeline (invite, accept, moves or resignation, settlement,
//! lobby mirrors) can be watched end to end from one terminal.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command, Scenario};
use gridmatch::{DocumentStore, LobbyView, MemoryStore, SessionEngine, SessionState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Demo { scenario } => run_demo(scenario).await,
    }
}

/// Plays one scripted match and prints the resulting stats.
async fn run_demo(scenario: Scenario) -> Result<()> {
    info!(?scenario, "Starting demo match");

    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let engine = SessionEngine::new(Arc::clone(&store));

    let alice = engine.create_player("Alice").await?;
    let bob = engine.create_player("Bob").await?;

    let game = engine.create_invite(&alice, &bob).await?;
    let lobby = LobbyView::new(&store, bob.clone()).await?;
    println!(
        "{} challenges {} ({} pending invite(s) for Bob)",
        alice,
        bob,
        lobby.incoming_invites().len()
    );

    engine.accept_invite(&game).await?;

    let session = match scenario {
        Scenario::Win => {
            // X takes the top row while O answers in the middle row.
            let moves = [(&alice, 0), (&bob, 3), (&alice, 1), (&bob, 4), (&alice, 2)];
            let mut session = engine.session(&game).await?;
            for (player, cell) in moves {
                session = engine.apply_move(&game, player, cell).await?;
            }
            session
        }
        Scenario::Draw => {
            let moves = [
                (&alice, 0),
                (&bob, 1),
                (&alice, 2),
                (&bob, 4),
                (&alice, 3),
                (&bob, 5),
                (&alice, 7),
                (&bob, 6),
                (&alice, 8),
            ];
            let mut session = engine.session(&game).await?;
            for (player, cell) in moves {
                session = engine.apply_move(&game, player, cell).await?;
            }
            session
        }
        Scenario::Resign => {
            engine.apply_move(&game, &alice, 4).await?;
            engine.apply_move(&game, &bob, 0).await?;
            engine.resign(&game, &bob).await?
        }
    };

    println!("\n{}\n", session.board().display());
    match session.state() {
        SessionState::Won(mark) => {
            let winner = session.player_for(mark);
            println!(
                "{} ({}) wins",
                engine.player(winner).await?.name(),
                mark
            );
        }
        SessionState::Draw => println!("Draw"),
        state => println!("Unexpected final state: {}", state),
    }

    println!("\nLeaderboard:");
    for (player, stats) in engine.leaderboard().await? {
        let name = engine.player(&player).await?.name().clone();
        println!(
            "  {:<8} {}W {}L {}D ({:.0}%)",
            name,
            stats.wins(),
            stats.losses(),
            stats.draws(),
            stats.win_rate()
        );
    }

    Ok(())
}
