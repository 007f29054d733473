//! Console formatting for market figures and recommendations.

use crate::alerts::TriggeredAlert;
use crate::launch::TokenLaunch;
use crate::signal::{Action, SignalBoard};
use std::fmt::Write;

/// Abbreviate with B/M/K suffixes and two decimals.
pub fn format_number(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if magnitude >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if magnitude >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        format!("{:.2}", value)
    }
}

/// Signed percentage with two decimals, or "N/A".
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:+.2}%", v),
        _ => "N/A".to_string(),
    }
}

pub fn format_price(price: f64) -> String {
    format!("${:.8}", price)
}

/// Human-facing action label.
pub fn action_label(action: Action) -> &'static str {
    match action {
        Action::PartialSell => "PARTIAL SELL",
        other => other.as_str(),
    }
}

/// One line per token.
pub fn render_board(board: &SignalBoard) -> String {
    let mut out = String::new();
    for signal in &board.signals {
        let rec = &signal.recommendation;
        let _ = write!(
            out,
            "{:<6} {} ({}) {:<12} {:>3}% hold {}/sell {}",
            signal.symbol,
            format_price(signal.price),
            format_percentage(Some(signal.price_change_24h)),
            action_label(rec.action),
            rec.confidence,
            rec.allocation.hold,
            rec.allocation.sell,
        );
        if let Some(prediction) = &signal.prediction {
            let _ = write!(
                out,
                " target {} ({:.0}% / {})",
                format_price(prediction.price_target),
                prediction.confidence,
                prediction.timeframe
            );
        }
        out.push('\n');
    }
    out
}

pub fn render_launch(launch: &TokenLaunch) -> String {
    format!(
        "{} ({}) on {} at {} - score {:.0}, cap ${}",
        launch.name,
        launch.symbol,
        launch.platform,
        launch.launch_time.format("%Y-%m-%d %H:%M UTC"),
        launch.potential_score,
        format_number(launch.initial_market_cap)
    )
}

pub fn render_alert(alert: &TriggeredAlert) -> String {
    format!("Price Alert: {}", alert)
}
