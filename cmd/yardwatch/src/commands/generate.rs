//! Generate command implementation.

use anyhow::{Context, Result};
use tracing::info;
use yardwatch_data::{SyntheticConfig, SyntheticGenerator};

/// Runs the generate command.
pub fn run(
    output: &str,
    seed: u64,
    machines: Option<u32>,
    yards: Option<u32>,
    messages_per_machine: Option<u32>,
) -> Result<()> {
    let mut config = SyntheticConfig::default().with_seed(seed);
    if let Some(count) = machines {
        config = config.with_machines(count);
    }
    if let Some(count) = yards {
        config = config.with_yards(count);
    }
    if let Some(count) = messages_per_machine {
        config = config.with_messages_per_machine(count);
    }
    if config.yard_count.is_empty() || *config.yard_count.start() == 0 {
        anyhow::bail!("At least one yard is required");
    }

    let dataset = SyntheticGenerator::new(config).generate();
    let (yards_path, messages_path) = dataset
        .save(output)
        .with_context(|| format!("Failed to write dataset to {output}"))?;

    info!(
        "Generated {} yards and {} messages",
        dataset.yards.len(),
        dataset.messages.len()
    );
    info!("Yards: {}", yards_path.display());
    info!("Messages: {}", messages_path.display());
    Ok(())
}
