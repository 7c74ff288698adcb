use clap::{Parser, Subcommand, ValueEnum};

use proxy::ProxyRotationStrategy;

#[derive(Debug, Parser)]
#[clap(name = "solecop", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitor → scheduler → checkout pipeline against a scripted demo site
    Run {
        /// Keyword rule string handed to the monitor's keyword matcher
        #[clap(long, default_value = "+jordan,+dunk low,-gs")]
        keywords: String,

        /// How many monitor ticks to run before exiting
        #[clap(long, default_value_t = 3)]
        ticks: usize,

        /// Maximum tasks the scheduler runs concurrently
        #[clap(long, default_value_t = 4)]
        max_concurrent: usize,
    },

    /// Exercise the proxy pool's rotation policy against a list of `host:port[:user:pass]` proxies
    ProxyCheck {
        #[clap(long, value_delimiter = ',')]
        proxies: Vec<String>,

        #[clap(long, value_enum, default_value = "round-robin")]
        strategy: StrategyArg,

        /// How many proxies to draw from the pool
        #[clap(long, default_value_t = 6)]
        draws: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    RoundRobin,
    Random,
    Sticky,
    Smart,
    Fastest,
    LeastUsed,
}

impl From<StrategyArg> for ProxyRotationStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::RoundRobin => ProxyRotationStrategy::RoundRobin,
            StrategyArg::Random => ProxyRotationStrategy::Random,
            StrategyArg::Sticky => ProxyRotationStrategy::Sticky,
            StrategyArg::Smart => ProxyRotationStrategy::Smart,
            StrategyArg::Fastest => ProxyRotationStrategy::Fastest,
            StrategyArg::LeastUsed => ProxyRotationStrategy::LeastUsed,
        }
    }
}
