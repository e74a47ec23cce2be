//! Leaderboard Sync Demo
//!
//! Drives the sync engine against the in-memory ranking service:
//! records a best while signed out, signs in, refreshes and prints
//! the resulting tables.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use leaderboard_sync::{
    Category, InMemoryLeaderboard, JsonFileStore, PlayerIdentity, SyncConfig, SyncSession, Window,
    LEVEL_COUNT, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    let config = SyncConfig::from_env().context("Invalid configuration")?;

    info!("Leaderboard Sync v{}", VERSION);
    info!("Level pacing: {:?}", config.level_pacing);
    info!("State file: {}", config.store_path.display());

    let store = Arc::new(JsonFileStore::open(&config.store_path).context("Failed to open state file")?);
    let remote = Arc::new(InMemoryLeaderboard::new());
    seed_rivals(&remote);

    demo_session(config, remote, store).await;
    Ok(())
}

/// Populate the service with a few other players.
fn seed_rivals(remote: &InMemoryLeaderboard) {
    let now = Utc::now();
    let rivals = [("g:ann", "Ann", 4200), ("g:bob", "Bob", 3100), ("g:cy", "Cy", 2750)];

    for (i, (subject, name, score)) in rivals.into_iter().enumerate() {
        let rival = PlayerIdentity::new(subject, Some(name.to_string()));
        remote.insert_score(&rival, Category::GlobalScore, score, now);
        for level in (i..LEVEL_COUNT).step_by(3) {
            let time_ms = 30_000 + (level as i64 * 1_700) + (i as i64 * 900);
            remote.insert_score(&rival, Category::LevelTime(level as u8), time_ms, now);
        }
    }
}

async fn demo_session(config: SyncConfig, remote: Arc<InMemoryLeaderboard>, store: Arc<JsonFileStore>) {
    info!("=== Starting Demo Session ===");

    let session = SyncSession::start(config, remote.clone(), store);
    info!("Display name: {}", session.player_display_name());

    // Offline best: recorded as owed, nothing sent
    session.report_score(3500, true);
    session.report_level_time(0, 28, true);
    info!("Pending before sign-in: {:?}", session.pending_submissions());

    // Sign in: pending bests are retried, a cached read starts
    let me = PlayerIdentity::new("g:demo", Some("Demo".to_string()));
    remote.set_player(Some(me.clone()));
    match session.on_session_established(me).await {
        Ok(results) => {
            for (category, outcome) in results {
                info!("Retried {}: {:?}", category, outcome);
            }
        }
        Err(e) => error!("Retry task failed: {}", e),
    }
    info!("Pending after sign-in: {:?}", session.pending_submissions());

    // Forced refresh, then poll readiness
    session.refresh();
    let mut polls = 0;
    while !(session.is_global_ready(Window::AllTime)
        && session.is_global_ready(Window::Weekly)
        && session.is_all_level_times_ready())
    {
        tokio::time::sleep(Duration::from_millis(250)).await;
        polls += 1;
        if polls % 20 == 0 {
            info!("Still waiting for rankings ({} polls)", polls);
        }
    }

    for window in Window::ALL {
        info!("=== Top Scores ({}) ===", window);
        for entry in session.top_entries(Category::GlobalScore, window) {
            info!("#{}: {} - {}", entry.rank.unwrap_or(0), entry.holder_name, entry.raw_value);
        }
        let own = session.self_entry(Category::GlobalScore, window);
        info!("You: {} - {} (rank {:?})", own.holder_name, own.raw_value, session.player_rank(window));
    }

    info!("=== Level Records (all-time) ===");
    for level in 0..LEVEL_COUNT {
        let entry = session.top_entry(Category::LevelTime(level as u8), Window::AllTime, 0);
        if !entry.is_unknown() {
            info!("Level {:02}: {} - {:.1}s", level + 1, entry.holder_name, entry.raw_value as f64 / 1000.0);
        }
    }

    info!("Time scores changed: {}", session.drain_change_flag());
    session.shutdown();
}
