use clap::Subcommand;
use pomotask_core::{Config, Event, PomodoroEngine, SessionCache, TaskId, TimerRunner};
use tokio::sync::broadcast::error::RecvError;

use super::{open_cache, print_json};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a countdown for a task in the foreground (Ctrl-C stops it)
    Run {
        /// Task the worked time is attributed to
        #[arg(long)]
        task: TaskId,
        /// Work phase length in minutes
        #[arg(long)]
        work: Option<u32>,
        /// Short break length in minutes
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break length in minutes
        #[arg(long)]
        long_break: Option<u32>,
        /// Start the next phase automatically instead of exiting
        #[arg(long)]
        auto: bool,
    },
    /// Print the effective timer configuration as JSON
    Show,
}

pub async fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run {
            task,
            work,
            short_break,
            long_break,
            auto,
        } => {
            let mut config = Config::load()?.timer;
            if let Some(minutes) = work {
                config.work_minutes = minutes;
            }
            if let Some(minutes) = short_break {
                config.short_break_minutes = minutes;
            }
            if let Some(minutes) = long_break {
                config.long_break_minutes = minutes;
            }

            let cache = open_cache()?;
            let engine = PomodoroEngine::new(task, config, cache.clone())?;
            let runner = TimerRunner::new(engine);
            run_foreground(&runner, &cache, auto).await
        }
        TimerAction::Show => {
            let config = Config::load()?;
            print_json(&config.timer)?;
            Ok(())
        }
    }
}

async fn run_foreground(
    runner: &TimerRunner,
    cache: &SessionCache,
    auto: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rx = runner.subscribe();
    runner.start().await;

    loop {
        tokio::select! {
            received = rx.recv() => {
                let event = match received {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                };
                print_json(&event)?;
                retry_unsaved(cache, &event);
                if let Event::PhaseCompleted { .. } = event {
                    if !auto {
                        break;
                    }
                    runner.start().await;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping timer");
                // The stop event also reaches `rx`, but the loop ends here.
                if let Some(event) = runner.stop().await {
                    print_json(&event)?;
                    retry_unsaved(cache, &event);
                }
                break;
            }
        }
    }

    print_json(&runner.snapshot().await)?;
    Ok(())
}

/// Give a session the cache refused one more chance before it is lost.
fn retry_unsaved(cache: &SessionCache, event: &Event) {
    let Some(session) = event.unsaved_session() else {
        return;
    };
    match cache.save_session(session.clone()) {
        Ok(()) => tracing::info!(task_id = %session.task_id(), "session cached on retry"),
        Err(e) => eprintln!(
            "warning: {}s worked on {} were not cached: {e}",
            session.duration(),
            session.task_id()
        ),
    }
}
