use std::sync::Arc;

use clap::Subcommand;
use focusdial_core::integrations::{
    Collaborators, Disabled, LogNotificationScheduler, LogStatusMirror, NotificationScheduler,
    StatusMirror,
};
use focusdial_core::timer::{self, SharedEngine, DEFAULT_TICK_PERIOD};
use focusdial_core::{Config, Database, EngineSnapshot, Event, SessionEngine, SystemClock, TaskId};
use serde_json::json;
use tracing::{info, warn};

const ENGINE_KEY: &str = "engine_snapshot";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus session
    Start {
        /// Duration in minutes (seconds in test mode). Defaults to timer.focus_duration
        #[arg(long)]
        minutes: Option<u32>,
        /// Task ID to link the session to
        #[arg(long)]
        task: Option<String>,
    },
    /// Pause the running session
    Pause,
    /// Resume the paused session
    Resume,
    /// Stop the session. A focus session then waits for `confirm` or `cancel`
    Stop,
    /// Take a break, parking the current focus session
    Break {
        /// Duration in minutes (seconds in test mode). Defaults to timer.break_duration
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// End the running break and return to focus
    EndBreak,
    /// Confirm a stopped focus session as completed
    Confirm,
    /// Cancel the stop request and keep focusing
    Cancel,
    /// Recompute timing against the wall clock
    Resync,
    /// Discard the current session without completing it
    Abandon,
    /// Print current timer state as JSON
    Status,
    /// Retry session saves, task credits and reward unlocks that failed earlier
    RetrySave,
    /// Tick until the session stops running, printing events as JSON lines
    Watch,
}

fn collaborators(config: &Config, db: Arc<Database>) -> Collaborators {
    let mirror: Arc<dyn StatusMirror> = if config.live_status.enabled {
        Arc::new(LogStatusMirror)
    } else {
        Arc::new(Disabled)
    };
    let notifier: Arc<dyn NotificationScheduler> = if config.notifications.enabled {
        Arc::new(LogNotificationScheduler)
    } else {
        Arc::new(Disabled)
    };
    Collaborators::new(mirror, notifier, db)
}

fn load_engine(db: &Arc<Database>, config: &Config) -> SessionEngine {
    let snapshot = match db.kv_get(ENGINE_KEY) {
        Ok(Some(json)) => serde_json::from_str::<EngineSnapshot>(&json).unwrap_or_else(|e| {
            warn!(error = %e, "discarding unreadable engine snapshot");
            EngineSnapshot::default()
        }),
        Ok(None) => EngineSnapshot::default(),
        Err(e) => {
            warn!(error = %e, "engine snapshot unavailable");
            EngineSnapshot::default()
        }
    };
    SessionEngine::restore(
        snapshot,
        config.engine_config(),
        Arc::new(SystemClock),
        collaborators(config, Arc::clone(db)),
    )
}

fn save_engine(db: &Database, engine: &SessionEngine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(&engine.snapshot())?;
    db.kv_set(ENGINE_KEY, &json)?;
    Ok(())
}

/// Print the status and every non-snapshot event produced by this invocation.
fn print_outcome(engine: &mut SessionEngine) -> Result<(), Box<dyn std::error::Error>> {
    let events: Vec<Event> = engine
        .drain_events()
        .into_iter()
        .filter(|e| !matches!(e, Event::StateChanged { .. }))
        .collect();
    let output = json!({
        "status": engine.status(),
        "events": events,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_async(action))
}

async fn run_async(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Arc::new(Database::open()?.with_catalog(config.reward_catalog()));
    let engine = timer::shared(load_engine(&db, &config));

    // Every invocation is a return from the background.
    timer::resync(&engine).await;

    let result = apply(&engine, &db, &config, action).await;

    let mut guard = engine.lock().await;
    save_engine(&db, &guard)?;
    result?;
    print_outcome(&mut guard)
}

async fn apply(
    engine: &SharedEngine,
    db: &Arc<Database>,
    config: &Config,
    action: TimerAction,
) -> Result<(), Box<dyn std::error::Error>> {
    if let TimerAction::Watch = action {
        return watch(engine, db).await;
    }

    let mut engine = engine.lock().await;
    match action {
        TimerAction::Start { minutes, task } => {
            let secs = minutes
                .map(|m| config.duration_secs(m))
                .unwrap_or_else(|| config.focus_duration_secs());
            engine.start(secs, task.map(TaskId))?;
        }
        TimerAction::Pause => {
            engine.pause()?;
        }
        TimerAction::Resume => {
            engine.resume()?;
        }
        TimerAction::Stop => {
            engine.stop()?;
        }
        TimerAction::Break { minutes } => {
            let secs = minutes
                .map(|m| config.duration_secs(m))
                .unwrap_or_else(|| config.break_duration_secs());
            engine.start_break(secs)?;
        }
        TimerAction::EndBreak => {
            engine.end_break_early()?;
        }
        TimerAction::Confirm => {
            engine.confirm_completion()?;
        }
        TimerAction::Cancel => {
            engine.cancel_completion()?;
        }
        TimerAction::Resync => {
            engine.resync_from_background();
        }
        TimerAction::Abandon => {
            engine.abandon()?;
        }
        TimerAction::Status => {}
        TimerAction::RetrySave => {
            let saved = engine.retry_pending_saves()?;
            info!(saved, "retried pending saves");
        }
        TimerAction::Watch => {}
    }
    Ok(())
}

async fn watch(engine: &SharedEngine, db: &Arc<Database>) -> Result<(), Box<dyn std::error::Error>> {
    engine.lock().await.subscribe(|event| {
        if matches!(event, Event::StateChanged { .. }) {
            return;
        }
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    });

    // Save as soon as a completion settles so a killed process does not
    // replay it on the next run.
    let db = Arc::clone(db);
    timer::spawn_ticker_with(Arc::clone(engine), DEFAULT_TICK_PERIOD, move |engine, report| {
        if report.completions == 0 {
            return;
        }
        if let Err(e) = save_engine(&db, engine) {
            warn!(error = %e, "saving engine snapshot after completion failed");
        }
    })
    .await?;
    // Already printed as they happened.
    engine.lock().await.drain_events();
    Ok(())
}
