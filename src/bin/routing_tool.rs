use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use shardscope::{PartitionName, RoutingFetchPolicy, RoutingScenario};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "routing-tool")]
#[command(about = "Developer tooling for shardscope routing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the routing described by a scenario file and print it as JSON.
    Resolve {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
    /// Print the fetch deadline for a table.
    Deadline {
        #[arg(long, conflicts_with = "partitions")]
        scenario: Option<PathBuf>,
        #[arg(long)]
        partitions: Option<usize>,
        #[arg(long)]
        timeout_per_partition_ms: Option<u64>,
    },
    /// Decode a partition index name.
    Partition {
        #[arg(long)]
        index: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Resolve { scenario, pretty } => resolve(&scenario, pretty),
        Command::Deadline {
            scenario,
            partitions,
            timeout_per_partition_ms,
        } => deadline(scenario.as_deref(), partitions, timeout_per_partition_ms),
        Command::Partition { index } => partition(&index),
    }
}

fn resolve(path: &Path, pretty: bool) -> Result<()> {
    let scenario = RoutingScenario::load(path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    let routing = runtime
        .block_on(scenario.run())
        .map_err(|err| anyhow!("routing failed: {}", err))?;

    let json = if pretty {
        serde_json::to_string_pretty(&routing)?
    } else {
        serde_json::to_string(&routing)?
    };
    println!("{}", json);
    Ok(())
}

fn deadline(
    scenario: Option<&Path>,
    partitions: Option<usize>,
    timeout_per_partition_ms: Option<u64>,
) -> Result<()> {
    let (mut policy, partitions) = match scenario {
        Some(path) => {
            let scenario = RoutingScenario::load(path)
                .with_context(|| format!("failed to load scenario {}", path.display()))?;
            let partitions = scenario.table.partition_count();
            (scenario.policy, partitions)
        }
        None => (RoutingFetchPolicy::default(), partitions.unwrap_or(0)),
    };
    if let Some(ms) = timeout_per_partition_ms {
        policy = policy.timeout_per_partition(Duration::from_millis(ms));
    }
    policy.validate()?;

    let timeout = policy.fetch_timeout(partitions);
    println!(
        "partitions={} timeout_ms={}",
        partitions,
        timeout.as_millis()
    );
    Ok(())
}

fn partition(index: &str) -> Result<()> {
    let name = PartitionName::from_index_name(index)?;
    let values = name
        .values()
        .iter()
        .map(|value| value.as_deref().unwrap_or("NULL"))
        .collect::<Vec<_>>()
        .join(", ");
    println!("table={} values=[{}]", name.table().fqn(), values);
    Ok(())
}
