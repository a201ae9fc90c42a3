//! `tilt run`

use anyhow::{Context, Result};
use stratoswarm_tilt_optimizer::{
    FramePacedEvaluator, RunEvent, RunEventType, RunOutcome, TiltScheduler,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cli::{OutputFormat, RunArgs};
use crate::config::AppConfig;
use crate::output;

pub async fn execute(args: RunArgs, mut config: AppConfig, format: OutputFormat) -> Result<()> {
    apply_overrides(&mut config, &args);

    let layout = config.layout.build();
    let evaluator =
        FramePacedEvaluator::new(config.site.yield_model(), config.site.latency_frames);
    let mut scheduler = TiltScheduler::new(layout, evaluator);

    let progress = tokio::spawn(log_progress(scheduler.subscribe()));
    let handle = scheduler
        .start_run(config.optimizer.clone())
        .context("Failed to start optimization run")?;

    info!(
        run_id = %handle.run_id(),
        algorithm = %config.optimizer.algorithm,
        rows = config.layout.rows,
        "Optimization started"
    );

    let interrupt = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, aborting run");
                handle.abort();
            }
        })
    };

    let outcome = scheduler.run().await;
    interrupt.abort();
    progress.abort();

    match outcome? {
        RunOutcome::Completed(report) => output::print_report(&report, scheduler.model(), format),
        RunOutcome::Aborted {
            run_id,
            evaluations,
        } => output::print_aborted(run_id, evaluations, scheduler.model(), format),
    }
}

fn apply_overrides(config: &mut AppConfig, args: &RunArgs) {
    if let Some(rows) = args.rows {
        config.layout.rows = rows;
    }
    if let Some(algorithm) = args.algorithm {
        config.optimizer.algorithm = algorithm.into();
    }
    if let Some(objective) = args.objective {
        config.optimizer.objective = objective.into();
    }
    if let Some(population) = args.population {
        config.optimizer.population_size = population;
    }
    if let Some(steps) = args.steps {
        config.optimizer.maximum_steps = steps;
    }
    if let Some(seed) = args.seed {
        config.optimizer.seed = Some(seed);
    }
    if let Some(latitude) = args.latitude {
        config.site.latitude_deg = latitude;
    }
}

async fn log_progress(mut events: broadcast::Receiver<RunEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match event.event_type {
                RunEventType::StepCompleted {
                    step, global_best, ..
                } => info!(step, global_best = ?global_best, "Outer step completed"),
                RunEventType::IndividualEvaluated {
                    index, fitness, ..
                } => debug!(index, fitness, "Individual evaluated"),
                _ => {}
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "Progress listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
