//! acctest runs acceptance suites against a running permissioned Ethereum cluster.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use strum::IntoEnumIterator;

use acctest_harness::{HarnessConfig, HarnessContext, Suite, SuiteRunner};
use cli::{Cli, Command, ConfigOverrides};

fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<HarnessConfig> {
    let mut config = HarnessConfig::load(path).context("Failed to load configuration")?;
    overrides.apply(&mut config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::List => {
            for suite in Suite::iter() {
                println!("{:<28} {}", suite, suite.description());
            }
        }

        Command::ShowConfig { save, overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            print!("{}", config.to_toml()?);

            if let Some(path) = save {
                config.save_to_file(&path)?;
            }
        }

        Command::Run {
            suites,
            fail_fast,
            overrides,
        } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            tracing::info!(
                nodes = config.nodes.len(),
                chain_id = config.chain_id,
                "Starting acceptance run..."
            );

            let ctx = HarnessContext::new(config).context("Invalid harness configuration")?;
            let runner = SuiteRunner::new(ctx);
            let suites = if suites.is_empty() {
                runner.default_suites()
            } else {
                suites
            };

            let report = runner.run_all(&suites, fail_fast).await;
            println!("{}", report);

            let failed = report.failures().count();
            if failed > 0 {
                anyhow::bail!("{} of {} suites failed", failed, report.outcomes.len());
            }
        }
    }

    Ok(())
}
