use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use roulette_client::{
    AnonymousIdentityProvider, MatchState, MemoryStore, Session, SessionBuilder, SessionConfig,
    SessionEvent,
};
use roulette_core::DurableUserId;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cargo-roulette")]
#[command(bin_name = "cargo-roulette")]
enum Cli {
    Roulette(RouletteArgs),
}

#[derive(clap::Args)]
struct RouletteArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match anonymous peers against an in-process rendezvous store.
    Simulate {
        #[arg(short, long, default_value_t = 4)]
        peers: usize,

        /// Seconds to keep the simulation running.
        #[arg(short, long, default_value_t = 10)]
        duration: u64,

        /// Session config as JSON; defaults apply to missing fields.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli::Roulette(args) = Cli::parse();

    match args.command {
        Commands::Simulate {
            peers,
            duration,
            config,
        } => {
            let config = match config {
                Some(raw) => SessionConfig::from_json(&raw).context("Invalid session config")?,
                None => SessionConfig::default(),
            };
            simulate(peers, Duration::from_secs(duration), config).await?;
        }
    }

    Ok(())
}

async fn simulate(peers: usize, duration: Duration, config: SessionConfig) -> Result<()> {
    println!("{}", format!("Starting simulation with {peers} peers...").green().bold());

    let store = MemoryStore::new();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<(usize, SessionEvent)>();
    let mut sessions: Vec<Session> = Vec::with_capacity(peers);

    for index in 0..peers {
        let (session, mut rx) = SessionBuilder::new(Arc::new(store.connect()))
            .config(config.clone())
            .build();

        let tx = events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if tx.send((index, event)).is_err() {
                    break;
                }
            }
        });

        let durable_id = DurableUserId(format!("sim-{index}"));
        session
            .authenticate(&AnonymousIdentityProvider, durable_id)
            .await
            .with_context(|| format!("Peer {index} failed to authenticate"))?;
        sessions.push(session);
    }
    drop(events_tx);

    for (index, session) in sessions.iter().enumerate() {
        if let Err(e) = session.start().await {
            println!("{}", format!("Peer {index} could not start: {e}").red());
        }
    }

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut matches = 0usize;
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            received = events_rx.recv() => {
                let Some((index, event)) = received else { break };
                match event {
                    SessionEvent::StateChanged(MatchState::Connected) => {
                        matches += 1;
                        let session = &sessions[index];
                        let room = session
                            .room_id()
                            .await
                            .map(|id| id.to_string())
                            .unwrap_or_default();
                        let role = session
                            .role()
                            .await
                            .map(|role| role.to_string())
                            .unwrap_or_default();
                        println!(
                            "{} peer {} connected in room {} as {}",
                            "✔".green().bold(),
                            index,
                            room.cyan(),
                            role
                        );
                    }
                    SessionEvent::Status { text, is_error: true } => {
                        println!("{} peer {}: {}", "✘".red().bold(), index, text.red());
                    }
                    SessionEvent::Counts(counts) => {
                        debug!(
                            "Peer {} sees {} online, {} waiting",
                            index, counts.online, counts.waiting
                        );
                    }
                    other => debug!("Peer {} event: {:?}", index, other),
                }
            }
        }
    }

    info!("Shutting down {} sessions", sessions.len());
    for session in &sessions {
        session.shutdown().await;
    }

    println!("{}", "Simulation finished.".green().bold());
    println!("   Connections: {matches}");
    println!("   Peers:       {peers}");
    Ok(())
}
