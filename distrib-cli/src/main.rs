//! Distrib CLI Tool
//!
//! Command line interface for checking a node pool configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use distrib_core::config::loader::load_config_from_path;
use distrib_core::Config;
use distrib_loadbalance::{LoadBalanceService, NodeStat};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "distrib")]
#[command(about = "A CLI tool for checking and exercising a load-balanced node pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long, default_value = "distrib.toml")]
        config: String,
    },
    /// Probe every node once and show its health
    Probe {
        /// Path to configuration file
        #[arg(short, long, default_value = "distrib.toml")]
        config: String,
        /// Print node statistics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Probe every node once, then pick nodes with the configured strategy
    Pick {
        /// Path to configuration file
        #[arg(short, long, default_value = "distrib.toml")]
        config: String,
        /// Number of picks
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Generate example configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "distrib_example.toml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            println!("Validating configuration file: {}", config);
            match load_and_validate(&config) {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("  - {} nodes configured", cfg.nodes.len());
                    println!("  - strategy: {:?}", cfg.settings.strategy);
                    println!(
                        "  - refresh interval: {}ms, probe timeout: {}ms",
                        cfg.settings.refresh_interval_ms, cfg.settings.probe_timeout_ms
                    );
                }
                Err(e) => {
                    eprintln!("❌ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Probe { config, json } => {
            let cfg = load_and_validate(&config)?;
            let service = LoadBalanceService::from_config_with_default_checks(&cfg)?;

            let result = service.distributor().refresh_now().await;
            let stats = service.node_stats();
            service.stop();

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_node_stats(&stats);
            }

            if let Err(e) = result {
                eprintln!("❌ Probe failed: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Pick { config, count } => {
            let cfg = load_and_validate(&config)?;
            let service = LoadBalanceService::from_config_with_default_checks(&cfg)?;

            if let Err(e) = service.distributor().refresh_now().await {
                eprintln!("❌ Probe failed: {}", e);
                std::process::exit(1);
            }

            println!(
                "Picking {} nodes with strategy {}",
                count,
                service.distributor().strategy_name()
            );
            for i in 1..=count {
                let node = service.pick()?;
                println!("{:>4}  {}  ({})", i, node, node.id());
                service.release(&node);
            }
            service.stop();
        }
        Commands::GenerateConfig { output } => {
            println!("Generating configuration file: {}", output);
            std::fs::write(&output, EXAMPLE_CONFIG)?;
            println!("✅ Configuration file generated successfully");
        }
    }

    Ok(())
}

fn load_and_validate(path: &str) -> Result<Config> {
    let config = load_config_from_path(path)?;
    config.validate()?;
    info!("Loaded {} nodes from {}", config.nodes.len(), path);
    Ok(config)
}

fn print_node_stats(stats: &[NodeStat]) {
    println!("🏥 Node Health");
    println!("==============");
    for stat in stats {
        println!(
            "{} {}  weight={}{}",
            if stat.healthy { "🟢" } else { "🔴" },
            stat.node,
            stat.node.weight(),
            if stat.used_for_routing { "" } else { "  (standby)" }
        );
    }

    let healthy = stats.iter().filter(|s| s.healthy).count();
    println!();
    println!("Healthy Nodes: {}/{}", healthy, stats.len());
}

const EXAMPLE_CONFIG: &str = r#"# Distrib Configuration File

[settings]
strategy = "weighted_random"
refresh_interval_ms = 500
probe_timeout_ms = 1000
http_probe_path = "/health"

[[nodes]]
host = "10.0.0.1"
port = 8080
protocol = "http"
weight = 10

[[nodes]]
host = "10.0.0.2"
port = 8080
protocol = "http"
weight = 5

# Only used when every other node is unreachable
[[nodes]]
host = "10.0.0.3"
port = 9000
protocol = "tcp"
weight = 0
"#;
