use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tunnelbench::config::{CommandSet, Config, LoggingConfig, CONFIG_ENV};
use tunnelbench::storage::schema::Scenario;

#[derive(Parser)]
#[command(
    name = "tunnelbench",
    about = "Scenario-driven performance testing for VPN links",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (TOML); falls back to $TUNNELBENCH_CONFIG, then ./tunnelbench.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server at the far end of the tunnel
    #[arg(long, global = true)]
    server: Option<String>,

    /// Interface carrying the tunnel (traffic shaping target)
    #[arg(long, global = true)]
    interface: Option<String>,

    /// Results table (CSV)
    #[arg(long, global = true)]
    results: Option<PathBuf>,

    /// Directory for rendered charts
    #[arg(long, global = true)]
    charts: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test scenarios, then render charts (default)
    Run {
        /// Only run these scenarios (repeatable); they still run in declared order
        #[arg(long = "scenario")]
        scenarios: Vec<Scenario>,

        /// Skip chart rendering
        #[arg(long)]
        no_charts: bool,
    },

    /// Render one chart per (scenario, metric) from the results table
    Visualize,

    /// Print per-(scenario, metric) statistics from the results table
    Summary {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Check that the external tools the commands need are installed
    SelfTest {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.target.server = server.clone();
        }
        if let Some(interface) = &self.interface {
            config.target.interface = interface.clone();
        }
        if let Some(results) = &self.results {
            config.results.path = results.clone();
        }
        if let Some(charts) = &self.charts {
            config.results.chart_dir = charts.clone();
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let found = Config::discover(cli.config.as_deref())?;
    let mut config = found.config;
    cli.apply_overrides(&mut config);
    config.validate()?;

    init_tracing(&config.logging);
    if let Some(e) = &found.skipped {
        tracing::warn!(
            error = %e,
            "{} set but file could not be loaded, using fallback",
            CONFIG_ENV
        );
    }
    match &found.source {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration"),
        None => tracing::debug!("No config file found, using compiled-in defaults"),
    }

    let command = cli.command.unwrap_or(Commands::Run {
        scenarios: Vec::new(),
        no_charts: false,
    });

    match command {
        Commands::Run {
            scenarios,
            no_charts,
        } => {
            let scenarios = if scenarios.is_empty() {
                Scenario::ALL.to_vec()
            } else {
                scenarios
            };
            tracing::info!(?scenarios, "Running scenarios");

            let report = tunnelbench::run_suite(&config, &scenarios, !no_charts).await?;

            println!("\n=== tunnelbench run ===");
            println!(
                "{:<16} | {:>5} | {:>7} | {:>6} | Storage errors",
                "Scenario", "Rows", "Missing", "Failed"
            );
            println!("{:-<16}-|-{:-<5}-|-{:-<7}-|-{:-<6}-|-{:-<14}", "", "", "", "", "");
            for s in &report.scenarios {
                println!(
                    "{:<16} | {:>5} | {:>7} | {:>6} | {}",
                    s.scenario, s.rows, s.missing, s.failed, s.storage_errors
                );
            }
            println!(
                "\n{} row(s) appended to {}",
                report.total_rows(),
                config.results.path.display()
            );
        }
        Commands::Visualize => {
            tracing::info!(
                table = %config.results.path.display(),
                dir = %config.results.chart_dir.display(),
                "Rendering charts"
            );
            let charts =
                tunnelbench::report::visualize(&config.results.path, &config.results.chart_dir)?;
            if charts.is_empty() {
                println!("No numeric results to chart.");
            } else {
                for chart in &charts {
                    println!("{}", chart.display());
                }
                println!("{} chart(s) saved.", charts.len());
            }
        }
        Commands::Summary { json } => {
            let rows = tunnelbench::storage::read_rows(&config.results.path)?;
            let summaries = tunnelbench::report::summarize(&rows);
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No results recorded yet.");
            } else {
                print!("{}", tunnelbench::report::summary::format_table(&summaries));
            }
        }
        Commands::SelfTest { json } => {
            let commands = CommandSet::render(&config)?;
            let report = tunnelbench::selftest::run(&commands);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\ntunnelbench Self-Test");
                println!("{:<12} | {:<10} | Details", "Tool", "Status");
                println!("{:-<12}-|-{:-<10}-|-{:-<40}", "", "", "");
                for res in &report.results {
                    let status_str = match res.status {
                        tunnelbench::selftest::TestStatus::Pass => "PASS",
                        tunnelbench::selftest::TestStatus::Fail => "FAIL",
                        tunnelbench::selftest::TestStatus::Warning => "WARN",
                    };
                    println!("{:<12} | {:<10} | {}", res.component, status_str, res.details);
                    if let Some(rem) = &res.remediation {
                        println!("{:<12} | {:<10} |   -> Recommendation: {}", "", "", rem);
                    }
                }
                println!();
                if report.ready {
                    println!("Ready to run.");
                } else {
                    println!("Not ready: install the failing tools first.");
                }
            }
        }
        Commands::ShowConfig => {
            let text = config
                .to_toml()
                .context("Failed to serialize configuration")?;
            print!("{}", text);
        }
    }

    Ok(())
}
