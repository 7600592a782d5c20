use std::path::PathBuf;

use acctest_harness::{HarnessConfig, Suite};
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "acctest")]
#[command(
    author,
    version,
    about = "Run acceptance suites against a permissioned Ethereum cluster"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "ACCTEST_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// Path to a configuration file, or a directory containing `Acctest.toml`.
    ///
    /// Without it, `Acctest.toml` in the working directory is used if present.
    #[arg(short, long, env = "ACCTEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run acceptance suites.
    Run {
        /// Suites to run, in order. Runs every suite when empty.
        suites: Vec<Suite>,

        /// Stop after the first failing suite.
        #[arg(long)]
        fail_fast: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// List the available suites.
    List,

    /// Print the effective configuration.
    ShowConfig {
        /// Also write it to this file.
        #[arg(long)]
        save: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },
}

/// Command-line settings applied on top of the file and environment.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// Chain id used to sign raw transactions.
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Directory holding the `key<N>` keystore files.
    #[arg(long)]
    pub keys_dir: Option<PathBuf>,

    /// Seconds to wait for a transaction to be mined.
    #[arg(long)]
    pub finality_timeout: Option<u64>,

    /// Seconds before a single JSON-RPC request is abandoned.
    #[arg(long)]
    pub rpc_timeout: Option<u64>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut HarnessConfig) {
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        if let Some(keys_dir) = &self.keys_dir {
            config.keys_dir = Some(keys_dir.clone());
        }
        if let Some(secs) = self.finality_timeout {
            config.timing.finality_timeout_secs = secs;
        }
        if let Some(secs) = self.rpc_timeout {
            config.timing.rpc_timeout_secs = secs;
        }
    }
}
