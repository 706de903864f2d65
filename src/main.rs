pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod assets;
pub mod processing;
pub mod render;
pub mod server;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use types::{Filters, Selection};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the dashboard once to a standalone HTML file
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Keep only these domains (repeatable; default: all)
        #[arg(long = "domain", value_name = "DOMAIN")]
        domains: Vec<String>,
        /// Keep only these retailers (repeatable; default: all)
        #[arg(long = "retailer", value_name = "RETAILER")]
        retailers: Vec<String>,
        #[arg(short, long, value_name = "FILE", default_value = "dashboard.html")]
        output: PathBuf,
    },
    /// Serve the interactive dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn selection(values: &[String]) -> Selection {
    if values.is_empty() {
        Selection::All
    } else {
        Selection::only(values.iter().cloned())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config, domains, retailers, output } => {
            info!("Rendering dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            // 1. Load and join
            let dataset = data::load_dataset(&app_config)?;

            // 2. Filter, aggregate, build markers
            let filters = Filters {
                domains: selection(domains),
                retailers: selection(retailers),
            };
            let logos = assets::LogoResolver::open(&app_config.input.logo_dir, app_config.map.logo_width);
            let dashboard = render::build_dashboard(&app_config, &dataset, &filters, &logos);

            // 3. Write the page
            let html = render::render_page(&dashboard, &app_config.map, false)?;
            std::fs::write(output, html)
                .with_context(|| format!("Failed to write {:?}", output))?;

            info!(
                "Wrote {:?}: {} locations, {} retailers, {} markers",
                output,
                dashboard.location_count,
                dashboard.summary.len(),
                dashboard.markers.len()
            );
        }
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}
