//! Command implementations and the arguments they share.

pub mod batch;
pub mod generate;
pub mod run;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::fs;
use std::path::Path;
use tracing::info;
use yardwatch_engine::{FlushPolicy, RunConfig};
use yardwatch_model::{Message, YardDirectory};

/// Input and output locations.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Path to the yard directory file
    #[arg(long, default_value = "yards.txt")]
    pub yards: String,

    /// Path to the message dataset
    #[arg(long, default_value = "machine_messages.json")]
    pub messages: String,

    /// Directory for the report files
    #[arg(short, long, default_value = "output")]
    pub output: String,

    /// Run configuration file (YAML or JSON)
    #[arg(short, long, env = "YARDWATCH_CONFIG")]
    pub config: Option<String>,
}

/// Overrides for the simulated link.
#[derive(Args, Debug, Default)]
pub struct LinkArgs {
    /// Replay speed multiplier
    #[arg(long)]
    pub speed: Option<f64>,

    /// Random seed for pacing and impairments
    #[arg(long)]
    pub seed: Option<u64>,

    /// Message loss probability
    #[arg(long)]
    pub loss: Option<f64>,

    /// Coordinate corruption probability
    #[arg(long)]
    pub error_rate: Option<f64>,

    /// Maximum delivery delay in seconds
    #[arg(long)]
    pub max_delay: Option<f64>,

    /// Channel capacity
    #[arg(long)]
    pub capacity: Option<usize>,
}

/// Overrides for the engine.
#[derive(Args, Debug, Default)]
pub struct EngineArgs {
    /// Number of consumer workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Live snapshot interval, in consumed messages
    #[arg(long)]
    pub report_every: Option<u64>,

    /// When machine time is credited to yards
    #[arg(long, value_enum)]
    pub flush_policy: Option<FlushPolicyArg>,
}

/// Flush policy as accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FlushPolicyArg {
    /// Credit after every accumulation
    Eager,
    /// Credit when a machine leaves its yard
    OnYardExit,
}

impl From<FlushPolicyArg> for FlushPolicy {
    fn from(arg: FlushPolicyArg) -> Self {
        match arg {
            FlushPolicyArg::Eager => Self::Eager,
            FlushPolicyArg::OnYardExit => Self::OnYardExit,
        }
    }
}

impl LinkArgs {
    fn apply(&self, config: &mut RunConfig) {
        let link = &mut config.link;
        if let Some(speed) = self.speed {
            link.pacing.speed_multiplier = speed;
        }
        if let Some(seed) = self.seed {
            link.impairment.seed = seed;
        }
        if let Some(loss) = self.loss {
            link.impairment.loss_probability = loss;
        }
        if let Some(rate) = self.error_rate {
            link.impairment.error_probability = rate;
        }
        if let Some(delay) = self.max_delay {
            link.impairment.max_delay_seconds = delay;
        }
        if let Some(capacity) = self.capacity {
            link.channel_capacity = capacity;
        }
    }
}

impl EngineArgs {
    fn apply(&self, config: &mut RunConfig) {
        let engine = &mut config.engine;
        if let Some(workers) = self.workers {
            engine.workers = workers;
        }
        if let Some(every) = self.report_every {
            engine.report_every_n_messages = every;
        }
        if let Some(policy) = self.flush_policy {
            engine.flush_policy = policy.into();
        }
    }
}

/// Loads the run configuration, applies CLI overrides and validates it.
pub fn resolve_config(input: &InputArgs, link: &LinkArgs, engine: &EngineArgs) -> Result<RunConfig> {
    let mut config = match &input.config {
        Some(path) => load_config(path)?,
        None => RunConfig::default(),
    };
    link.apply(&mut config);
    engine.apply(&mut config);
    config.validate().context("Invalid run configuration")?;
    Ok(config)
}

fn load_config(path: &str) -> Result<RunConfig> {
    info!("Loading run configuration: {}", path);
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read config file: {path}"))?;
    parse_config(&content, Path::new(path))
        .with_context(|| format!("Failed to parse config file: {path}"))
}

fn parse_config(content: &str, path: &Path) -> Result<RunConfig> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_str(content)?)
    } else {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Loads the yard directory and the message dataset.
pub fn load_inputs(input: &InputArgs) -> Result<(YardDirectory, Vec<Message>)> {
    let directory = yardwatch_data::load_yards(&input.yards)
        .with_context(|| format!("Failed to load yards: {}", input.yards))?;
    let messages = yardwatch_data::load_messages(&input.messages)
        .with_context(|| format!("Failed to load messages: {}", input.messages))?;
    info!(
        "Loaded {} yards and {} messages",
        directory.len(),
        messages.len()
    );
    Ok((directory, messages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_and_json_configs_parse() {
        let yaml = "link:\n  impairment:\n    loss_probability: 0.2\nengine:\n  workers: 3\n";
        let config = parse_config(yaml, Path::new("run.yaml")).unwrap();
        assert!((config.link.impairment.loss_probability - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.engine.workers, 3);
        assert_eq!(config.link.channel_capacity, 64);

        let json = r#"{"engine": {"flush_policy": "on_yard_exit"}}"#;
        let config = parse_config(json, Path::new("run.JSON")).unwrap();
        assert_eq!(config.engine.flush_policy, FlushPolicy::OnYardExit);
    }

    #[test]
    fn flags_override_defaults() {
        let mut config = RunConfig::default();
        LinkArgs {
            loss: Some(0.0),
            speed: Some(10.0),
            ..LinkArgs::default()
        }
        .apply(&mut config);
        EngineArgs {
            workers: Some(4),
            flush_policy: Some(FlushPolicyArg::OnYardExit),
            ..EngineArgs::default()
        }
        .apply(&mut config);

        assert!(config.link.impairment.loss_probability.abs() < f64::EPSILON);
        assert!((config.link.pacing.speed_multiplier - 10.0).abs() < f64::EPSILON);
        assert_eq!(config.engine.workers, 4);
        assert_eq!(config.engine.flush_policy, FlushPolicy::OnYardExit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn out_of_range_override_is_refused() {
        let input = InputArgs {
            yards: String::new(),
            messages: String::new(),
            output: String::new(),
            config: None,
        };
        let link = LinkArgs {
            loss: Some(1.5),
            ..LinkArgs::default()
        };
        assert!(resolve_config(&input, &link, &EngineArgs::default()).is_err());
    }
}
