//! crudbench - run the CRUD latency benchmarks from the command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crudbench::config::DEFAULT_CONFIG_FILE;
use crudbench::{BenchConfig, Measurement, Suite, Workload, WorkloadReport};

/// CRUD latency benchmarks across MongoDB, PostgreSQL, MySQL and Redis.
#[derive(Parser, Debug)]
#[command(name = "crudbench")]
#[command(version, about = "CRUD latency benchmarks across MongoDB, PostgreSQL, MySQL and Redis")]
struct Args {
    /// Configuration file (defaults apply if it does not exist)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Directory for CSV and PNG artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Repetitions for the delete and update workloads
    #[arg(short = 'n', long)]
    repetitions: Option<usize>,

    /// Write CSV files only
    #[arg(long)]
    skip_charts: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Time deleting a freshly inserted record
    Delete,
    /// Time updating the price of one record
    Update,
    /// Time one bulk read of full ride records
    SelectAll,
    /// Time bulk reads of increasing size
    SelectTiers,
    /// Time the filter and aggregation query catalog
    Queries,
    /// Run every workload
    All,
}

impl Command {
    /// The single workload to run, or `None` for `all`.
    fn workload(self) -> Option<Workload> {
        match self {
            Command::Delete => Some(Workload::Delete),
            Command::Update => Some(Workload::Update),
            Command::SelectAll => Some(Workload::SelectAll),
            Command::SelectTiers => Some(Workload::SelectTiers),
            Command::Queries => Some(Workload::Queries),
            Command::All => None,
        }
    }
}

impl Args {
    /// Load the configuration file and apply command-line overrides.
    fn into_config(self) -> crudbench::Result<BenchConfig> {
        let mut config = BenchConfig::load_or_default(&self.config)?;
        if let Some(dir) = self.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(repetitions) = self.repetitions {
            config = config.with_repetitions(repetitions);
        }
        if self.skip_charts {
            config.report.skip_charts = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crudbench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let command = args.command;
    let config = args.into_config()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        output_dir = %config.report.output_dir.display(),
        "starting benchmarks"
    );

    let mut suite = Suite::with_drivers(&config);
    let reports = match command.workload() {
        Some(workload) => vec![suite.run(workload)?],
        None => suite.run_all()?,
    };
    for report in &reports {
        print_summary(report);
    }

    Ok(())
}

/// Print one line per backend plus the artifact paths.
fn print_summary(report: &WorkloadReport) {
    let unit = report.workload.unit();
    println!("{}", report.workload);

    for (backend, result) in report.table.iter() {
        let line = match result {
            Ok(Measurement::Repeated(samples)) => format!(
                "mean {:.3} {} over {} runs",
                unit.from_millis(report.table.mean_of(backend).unwrap_or_default()),
                unit.suffix(),
                samples.len()
            ),
            Ok(Measurement::Single(millis)) => {
                format!("{:.3} {}", unit.from_millis(*millis), unit.suffix())
            }
            Ok(Measurement::Tiered(tiers)) => tiers
                .iter()
                .map(|t| match &t.millis {
                    Ok(ms) => format!("{}: {:.3} {}", t.size, unit.from_millis(*ms), unit.suffix()),
                    Err(_) => format!("{}: unavailable", t.size),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Ok(Measurement::Queries(queries)) => {
                let done = queries.iter().filter(|q| q.millis.is_ok()).count();
                let total: f64 = queries.iter().filter_map(|q| q.millis.as_ref().ok()).sum();
                format!(
                    "{done}/{} queries, {:.3} {} total",
                    queries.len(),
                    unit.from_millis(total),
                    unit.suffix()
                )
            }
            Err(unavailable) => format!("unavailable ({unavailable})"),
        };
        println!("  {:<12}{}", backend.name(), line);
    }

    println!("  csv:   {}", report.artifacts.csv.display());
    if let Some(chart) = &report.artifacts.chart {
        println!("  chart: {}", chart.display());
    }
}
