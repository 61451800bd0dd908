//! Realtime run: paced replay over the impaired link.

use super::{load_inputs, resolve_config, EngineArgs, InputArgs, LinkArgs};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use yardwatch_engine::{Pipeline, RunReport};

/// Runs the realtime command.
pub async fn run(input: &InputArgs, link: &LinkArgs, engine: &EngineArgs) -> Result<()> {
    let config = resolve_config(input, link, engine)?;
    let (directory, messages) = load_inputs(input)?;

    info!(
        loss = config.link.impairment.loss_probability,
        error = config.link.impairment.error_probability,
        max_delay = config.link.impairment.max_delay_seconds,
        speed = config.link.pacing.speed_multiplier,
        workers = config.engine.workers,
        "Starting realtime replay"
    );

    let pipeline = Pipeline::new(&config, Arc::new(directory), messages)
        .context("Failed to set up the pipeline")?;

    let stop = pipeline.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, stopping replay");
            stop.stop();
        }
    });

    let report = pipeline.run().await.context("Realtime run failed");
    interrupt.abort();
    let report = report?;

    log_outcome(&report);
    let written = yardwatch_data::save_all(&report, &input.output)
        .with_context(|| format!("Failed to write reports to {}", input.output))?;
    for path in written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

/// Logs the headline numbers of a finished run.
pub fn log_outcome(report: &RunReport) {
    let stats = &report.stats;
    let fingerprint = format!("{:016x}", report.fingerprint);
    info!(
        generated = stats.generated,
        delivered = stats.delivered,
        lost = stats.lost,
        corrupted = stats.corrupted,
        rejected = stats.rejected,
        "Reliability {:.1}%, error rate {:.1}%",
        stats.reliability_percent(),
        stats.error_rate_percent()
    );
    info!(
        transitions = report.transitions.len(),
        completed = report.completed_yards(),
        yards = report.yards.len(),
        %fingerprint,
        "Run finished in {:.1}s",
        report.elapsed_seconds
    );
    if report.stopped_early {
        warn!("Replay was stopped before the dataset was exhausted");
    }
}
