use std::{
    env,
    io::{self, Write},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use log::info;
use tokio::sync::broadcast::error::RecvError;

use stillpoint::{
    load_activities, ControllerConfig, LogNarration, SessionController, SessionEvent,
};

/// Plays an activity set from a JSON file in the terminal, rating every
/// activity with the same value. Mostly a demonstration of wiring a
/// renderer and scheduler around the engine.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let path = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: stillpoint <activities.json> [rating]"))?;
    let rating: u8 = match env::args().nth(2) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid rating '{raw}'"))?,
        None => 7,
    };

    let activities = load_activities(Path::new(&path))?;
    info!("loaded {} activities from {path}", activities.len());

    let controller = SessionController::new(
        activities,
        Box::new(LogNarration),
        ControllerConfig::default(),
    )?;
    let mut events = controller.subscribe();

    controller.start_activity().await?;

    loop {
        match events.recv().await {
            Ok(SessionEvent::PhaseEntered {
                activity_index,
                phase_index,
                cycle_index,
                phase,
            }) => {
                println!(
                    "[activity {activity_index}] cycle {cycle_index}, phase {phase_index}: {} ({}s)",
                    phase.name, phase.duration_seconds
                );
                if let Some(text) = &phase.narration_text {
                    println!("  \"{text}\"");
                }
            }
            Ok(SessionEvent::TickOccurred { seconds_remaining }) => {
                print!("\r  {seconds_remaining:>3}s remaining");
                io::stdout().flush().ok();
                if seconds_remaining == 0 {
                    println!();
                }
            }
            Ok(SessionEvent::ActivityCompleted { activity_index }) => {
                println!("activity {activity_index} complete, rating it {rating}");
                controller.record_rating(rating).await?;
                if controller.advance().await?.is_none() {
                    controller.start_activity().await?;
                }
            }
            Ok(SessionEvent::QueueFinished { ratings }) => {
                println!("session finished, ratings: {ratings:?}");
                break;
            }
            Err(RecvError::Lagged(skipped)) => {
                info!("renderer lagged, skipped {skipped} events");
            }
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}
