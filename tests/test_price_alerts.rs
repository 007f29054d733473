//! Tests for the price alert monitor against a running simulator

use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use xelion::alerts::{AlertCondition, PriceAlertBook, PriceAlertMonitor, TriggeredAlert};
use xelion::config::parse_price_alerts;
use xelion::market::{MarketSimulator, SimulatorConfig};

fn create_test_simulator() -> Result<MarketSimulator> {
    let config = SimulatorConfig {
        tick_interval: Duration::from_secs(10),
        ..SimulatorConfig::default()
    };
    MarketSimulator::with_seed(config, 31)
}

fn collect_alerts(monitor: &PriceAlertMonitor) -> Arc<Mutex<Vec<TriggeredAlert>>> {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    let _subscription = monitor.subscribe(move |alert| {
        sink.lock().unwrap().push(alert.clone());
    });
    fired
}

#[tokio::test(start_paused = true)]
async fn test_monitor_checks_once_per_interval() -> Result<()> {
    let simulator = create_test_simulator()?;
    let book: PriceAlertBook = parse_price_alerts("solf>0.000000001,LBOT<0.000000001")?
        .into_iter()
        .collect();
    let monitor = PriceAlertMonitor::new(book, Duration::from_secs(65));
    let fired = collect_alerts(&monitor);

    simulator.start();
    monitor.start(&simulator);

    tokio::time::sleep(Duration::from_secs(64)).await;
    assert!(fired.lock().unwrap().is_empty(), "first check waits a full interval");

    tokio::time::sleep(Duration::from_secs(2)).await;
    {
        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].alert.symbol, "SOLF");
        assert_eq!(fired[0].alert.condition, AlertCondition::Above);
        assert_eq!(fired[0].price, simulator.snapshot().token("SOLF").unwrap().price);
    }

    // Alerts stay armed
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(fired.lock().unwrap().len(), 2);

    monitor.stop();
    simulator.stop();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fired.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_check_now_uses_latest_snapshot() -> Result<()> {
    let simulator = create_test_simulator()?;
    let monitor = PriceAlertMonitor::new(PriceAlertBook::new(), Duration::from_secs(60));

    assert!(monitor.check_now().is_empty(), "nothing to check before start");

    monitor.start(&simulator);
    monitor.set_alert("nsol", 1_000.0, AlertCondition::Below);
    assert_eq!(monitor.alert_count(), 1);

    let fired = monitor.check_now();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].alert.symbol, "NSOL");

    monitor.stop();
    Ok(())
}
