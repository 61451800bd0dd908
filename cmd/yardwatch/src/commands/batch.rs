//! Batch run: every message straight into the engine, no link.

use super::{load_inputs, resolve_config, run::log_outcome, EngineArgs, InputArgs, LinkArgs};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Runs the batch command.
pub fn run(input: &InputArgs, engine: &EngineArgs) -> Result<()> {
    let config = resolve_config(input, &LinkArgs::default(), engine)?;
    let (directory, messages) = load_inputs(input)?;

    info!("Processing {} messages in batch mode", messages.len());
    let report = yardwatch_engine::run_batch(&config.engine, Arc::new(directory), messages)
        .context("Batch run failed")?;

    log_outcome(&report);
    let written = yardwatch_data::save_all(&report, &input.output)
        .with_context(|| format!("Failed to write reports to {}", input.output))?;
    for path in written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}
