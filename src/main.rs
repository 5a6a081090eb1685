use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Result, WrapErr};
use env_logger::Env;
use log::info;

use netsim::analysis::analyze_topology;
use netsim::autofix::propose_fixes;
use netsim::loader;
use netsim::recommend::recommend;
use netsim::report::{generate_json_report, generate_text_report, PipelineReport};
use netsim::simulation::{simulate_all, Scenario};
use netsim::topology::{build_topology, BuildOptions};
use netsim::validator::validate_topology;

/// Network topology validation, analysis and what-if simulation
#[derive(Parser, Debug)]
#[command(name = "netsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Device and link records (YAML, or JSON by extension)
    #[arg(short, long, global = true, default_value = "topology.yaml")]
    input: PathBuf,

    /// Extra links, one `DEV:IF - DEV:IF [capacity]` per line
    #[arg(short, long, global = true)]
    links: Option<PathBuf>,

    /// Analysis thresholds (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Number of parallel workers (0 = auto-detect)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the validation battery
    Validate,

    /// Analyze reachability, paths, critical links and utilization
    Analyze,

    /// Simulate failures or traffic against a copy of the topology
    Simulate {
        /// Take a link down (link id or DEV-DEV)
        #[arg(long)]
        link_down: Vec<String>,

        /// Take every link of a device down
        #[arg(long)]
        device_down: Vec<String>,

        /// Inject traffic: DEVICE:BPS[:DEST]
        #[arg(long, value_parser = parse_injection)]
        inject: Vec<Scenario>,

        /// Apply all given events together instead of one scenario each
        #[arg(long)]
        combined: bool,

        /// Also re-run the validator on each simulated topology
        #[arg(long)]
        validate: bool,
    },

    /// Propose fixes for validator findings
    Autofix,

    /// Validation, analysis and recommendations in one report
    Report,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Parse `DEVICE:BPS[:DEST]`
fn parse_injection(value: &str) -> Result<Scenario, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let (source, volume, destination) = match parts.as_slice() {
        [source, volume] => (*source, *volume, None),
        [source, volume, destination] => (*source, *volume, Some(destination.to_string())),
        _ => return Err(format!("expected DEVICE:BPS[:DEST], got '{}'", value)),
    };
    let volume_bps = volume
        .parse::<u64>()
        .map_err(|_| format!("invalid traffic volume '{}'", volume))?;
    Ok(Scenario::TrafficInjection {
        source: source.to_string(),
        destination,
        volume_bps,
    })
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .wrap_err("Failed to configure thread pool")?;
    }

    let config = loader::load_analysis_config(cli.config.as_deref())?;
    let input = loader::load_inputs(&cli.input, cli.links.as_deref())?;
    let topology = build_topology(&input, &BuildOptions::from(&config)).wrap_err("Failed to build topology")?;
    info!("Built topology with {} devices and {} links", topology.device_count(), topology.link_count());

    let mut report = PipelineReport {
        device_count: topology.device_count(),
        link_count: topology.link_count(),
        ..Default::default()
    };

    match cli.command {
        Commands::Validate => {
            report.findings = Some(validate_topology(&topology));
        }
        Commands::Analyze => {
            report.analysis = Some(analyze_topology(&topology, &config));
        }
        Commands::Simulate {
            link_down,
            device_down,
            inject,
            combined,
            validate,
        } => {
            let mut scenarios: Vec<Scenario> = link_down
                .into_iter()
                .map(|link| Scenario::LinkDown { link })
                .chain(device_down.into_iter().map(|device| Scenario::DeviceDown { device }))
                .chain(inject)
                .collect();
            if scenarios.is_empty() {
                bail!("No scenario given; use --link-down, --device-down or --inject");
            }
            if combined {
                scenarios = vec![Scenario::Combined(scenarios)];
            }

            for (scenario, result) in scenarios.iter().zip(simulate_all(&topology, &scenarios, &config, validate)) {
                let result = result.wrap_err_with(|| format!("Scenario '{}' failed", scenario))?;
                report.simulations.push(result);
            }
        }
        Commands::Autofix => {
            let findings = validate_topology(&topology);
            report.autofix = Some(propose_fixes(&topology, &findings)?);
            report.findings = Some(findings);
        }
        Commands::Report => {
            let findings = validate_topology(&topology);
            let analysis = analyze_topology(&topology, &config);
            report.recommendations = Some(recommend(&findings, &analysis, &config));
            report.findings = Some(findings);
            report.analysis = Some(analysis);
        }
    }

    let output = match cli.format {
        OutputFormat::Text => generate_text_report(&report),
        OutputFormat::Json => generate_json_report(&report)?,
    };
    println!("{}", output);
    Ok(())
}
