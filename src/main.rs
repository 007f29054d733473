//! Xelion console dashboard.
//!
//! Runs the market simulator and every service that follows it, logging
//! signal boards, price alerts and launches until Ctrl-C.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{info, warn};
use xelion::alerts::{PriceAlertBook, PriceAlertMonitor};
use xelion::display::{render_alert, render_board, render_launch};
use xelion::launch::{LaunchStorage, LaunchTracker, PumpFunLaunchSource, SqliteLaunchStore};
use xelion::market::{default_market, MarketSimulator};
use xelion::signal::SignalAdvisor;
use xelion::XelionConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = XelionConfig::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .init();

    info!("Starting Xelion market core");

    // Derive every RNG from one seed so a seeded run is reproducible.
    let mut seeder = match config.rng_seed {
        Some(seed) => {
            info!("Using fixed RNG seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let simulator = MarketSimulator::new(
        config.simulator_config(),
        default_market(chrono::Utc::now()),
        StdRng::from_rng(&mut seeder)?,
    )?;
    let advisor = SignalAdvisor::new(config.refresh_interval(), StdRng::from_rng(&mut seeder)?)?;
    let alert_monitor = PriceAlertMonitor::new(
        config.price_alerts.iter().cloned().collect::<PriceAlertBook>(),
        config.price_alert_interval(),
    );

    let mut launches = LaunchTracker::builder(Arc::new(PumpFunLaunchSource::new(
        config.http_source_config(),
    )?))
    .with_config(config.launch_tracker_config());
    if let Some(url) = &config.database_url {
        let store: Arc<dyn LaunchStorage> = Arc::new(SqliteLaunchStore::connect(url).await?);
        launches = launches.with_storage(store);
    }
    let launch_tracker = launches.build();

    let boards = advisor.subscribe(|board| {
        info!("Signals for tick {}:\n{}", board.source_tick, render_board(board));
    });
    let alerts = alert_monitor.subscribe(|alert| warn!("{}", render_alert(alert)));
    let launch_updates = launch_tracker.subscribe(|launches| {
        info!("{} high-potential launches", launches.len());
        for launch in launches.iter() {
            info!("  {}", render_launch(launch));
        }
    });

    simulator.start();
    advisor.start(&simulator);
    alert_monitor.start(&simulator);
    launch_tracker.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    launch_tracker.stop();
    alert_monitor.stop();
    advisor.stop();
    simulator.stop();

    boards.unsubscribe();
    alerts.unsubscribe();
    launch_updates.unsubscribe();

    let stats = simulator.stats();
    info!(
        "Simulator ran {} ticks ({} failed), {} whale alerts, {} snapshots published",
        stats.ticks_completed, stats.ticks_failed, stats.whale_alerts_generated, stats.snapshots_published
    );

    Ok(())
}
