//! Command-line entry point: reads a JSON run configuration, evolves until
//! convergence or exhaustion, and writes the Pareto archive as JSON.
//!
//! Usage:
//!
//! ```text
//! gpsr <config.json> [--resume <checkpoint.json>]
//! ```

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gpsr::data::TrainingData;
use gpsr::engine::{EvolutionEngine, EvolutionOptions, EvolutionReport};
use gpsr::error::{GpsrError, Result, ResultExt};
use gpsr::evaluation::{
    ConstrainedRegression, ConstraintConfig, Monotonicity, SignBound,
};
use gpsr::expression::{ComponentPool, Generator, OpKind};
use gpsr::local_opt::LevenbergMarquardt;

/// One run, as described by the configuration file.
#[derive(Debug, Deserialize)]
struct RunConfig {
    /// Path to the training data JSON (`{"x": [[..], ..], "y": [..]}`).
    data_path: PathBuf,
    /// Operator symbols to evolve with, e.g. `["+", "-", "*"]`.
    operators: Vec<String>,
    #[serde(default)]
    constraints: ConstraintSection,
    /// Optional uniform subsample of the training rows.
    #[serde(default)]
    subsample: Option<usize>,
    /// Where to write the final archive.
    output_path: PathBuf,
    /// Apply algebraic simplification to freshly generated individuals.
    #[serde(default = "default_true")]
    simplify: bool,
    #[serde(default)]
    evolution: EvolutionOptions,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConstraintSection {
    axis: usize,
    /// "non_increasing", "non_decreasing", or absent for unconstrained.
    monotonicity: Option<String>,
    /// "non_positive", "non_negative", or absent for unconstrained.
    sign: Option<String>,
}

impl Default for ConstraintSection {
    fn default() -> Self {
        Self {
            axis: 0,
            monotonicity: Some("non_increasing".to_string()),
            sign: Some("non_positive".to_string()),
        }
    }
}

impl ConstraintSection {
    fn to_config(&self) -> Result<ConstraintConfig> {
        let monotonicity = match self.monotonicity.as_deref() {
            None => None,
            Some("non_increasing") => Some(Monotonicity::NonIncreasing),
            Some("non_decreasing") => Some(Monotonicity::NonDecreasing),
            Some(other) => {
                return Err(GpsrError::Configuration(format!(
                    "unknown monotonicity constraint: {}",
                    other
                )))
            }
        };
        let sign = match self.sign.as_deref() {
            None => None,
            Some("non_positive") => Some(SignBound::NonPositive),
            Some("non_negative") => Some(SignBound::NonNegative),
            Some(other) => {
                return Err(GpsrError::Configuration(format!(
                    "unknown sign constraint: {}",
                    other
                )))
            }
        };
        Ok(ConstraintConfig {
            axis: self.axis,
            monotonicity,
            sign,
        })
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let (config_path, resume_path) = parse_args()?;

    let raw = fs::read_to_string(&config_path)
        .context(format!("cannot read config {}", config_path.display()))?;
    let config: RunConfig = serde_json::from_str(&raw)
        .context(format!("invalid config {}", config_path.display()))?;
    config.evolution.validate()?;

    let mut data = TrainingData::from_json_file(&config.data_path)?;
    if let Some(n) = config.subsample {
        let mut rng = match config.evolution.seed {
            Some(seed) => gpsr::rng::RandomNumberGenerator::from_seed(seed),
            None => gpsr::rng::RandomNumberGenerator::new(),
        };
        data = data.subsample(n, &mut rng)?;
    }
    info!(
        rows = data.num_rows(),
        features = data.num_features(),
        "training data loaded"
    );
    let data = Arc::new(data);

    let mut pool = ComponentPool::new(data.num_features())?;
    for symbol in &config.operators {
        let op = OpKind::from_symbol(symbol).ok_or_else(|| {
            GpsrError::Configuration(format!("unknown operator symbol: {}", symbol))
        })?;
        pool.add_operator(op);
    }

    let generator = Generator::new(config.evolution.stack_size, pool, config.simplify)?;
    let evaluator = ConstrainedRegression::new(
        Arc::clone(&data),
        config.constraints.to_config()?,
        LevenbergMarquardt::default(),
    )?;

    let mut engine = match resume_path {
        Some(path) => {
            EvolutionEngine::resume(path, config.evolution.clone(), generator, evaluator)?
        }
        None => EvolutionEngine::new(config.evolution.clone(), generator, evaluator)?,
    };

    let report = engine.run()?;
    summarize(&report);
    report.archive.write_json(&config.output_path)?;
    info!(path = %config.output_path.display(), "archive written");
    Ok(())
}

fn parse_args() -> Result<(PathBuf, Option<PathBuf>)> {
    let mut args = std::env::args().skip(1);
    let config = args
        .next()
        .ok_or_else(|| GpsrError::Configuration(usage()))?;
    let resume = match args.next() {
        None => None,
        Some(flag) if flag == "--resume" => {
            let path = args
                .next()
                .ok_or_else(|| GpsrError::Configuration(usage()))?;
            Some(PathBuf::from(path))
        }
        Some(_) => return Err(GpsrError::Configuration(usage())),
    };
    Ok((PathBuf::from(config), resume))
}

fn usage() -> String {
    "usage: gpsr <config.json> [--resume <checkpoint.json>]".to_string()
}

fn summarize(report: &EvolutionReport) {
    info!(
        state = ?report.state,
        generations = report.generations,
        archive_len = report.archive.len(),
        "run finished"
    );
    if let Some(best) = &report.best {
        info!(
            fitness = ?best.fitness(),
            complexity = best.complexity(),
            equation = %best,
            "best individual"
        );
    }
}
