pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod filter;
pub mod spatial;
pub mod choropleth;
pub mod selection;
pub mod session;
pub mod detail;
pub mod dashboard;
pub mod svg;
pub mod page;
pub mod render;
pub mod server;

#[cfg(test)]
mod fixtures;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the interactive dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Export the choropleth for one year as PNG map tiles
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Defaults to the latest year in the dataset
        #[arg(short, long)]
        year: Option<i32>,
        /// Indicator key; defaults to the configured map indicator
        #[arg(short, long)]
        indicator: Option<String>,
        /// Use the fixed country colors instead of the indicator scale
        #[arg(long)]
        colors: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cache = data::LoadCache::default();

    match cli.command {
        Commands::Serve { config } => {
            info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let dataset = cache.get_or_load(&app_config).context("Failed to load dashboard inputs")?;

            server::start_server(app_config, dataset).await?;
        }
        Commands::Export { config, year, indicator, colors } => {
            info!("Exporting tiles with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(&config)?;
            let dataset = cache.get_or_load(&app_config).context("Failed to load dashboard inputs")?;

            let request = dashboard::ViewRequest {
                year,
                indicator,
                view: if colors { dashboard::MapView::Color } else { dashboard::MapView::Indicator },
            };
            let view = dashboard::run(
                &dataset,
                &request,
                &selection::Selection::Unselected,
                &app_config.map.default_indicator,
            );
            for notice in &view.notices {
                println!("{}", notice);
            }

            let layer = match view.view {
                dashboard::MapView::Color => "colors".to_string(),
                dashboard::MapView::Indicator => dataset
                    .indicators
                    .get(view.indicator)
                    .map(|spec| spec.key.clone())
                    .ok_or_else(|| anyhow!("No indicators configured"))?,
            };
            let out_dir = app_config.output.tile_dir.join(layer).join(view.year.to_string());
            let written = render::generate_tiles(
                &dataset,
                &view.map,
                &out_dir,
                app_config.output.min_zoom,
                app_config.output.max_zoom,
            )?;

            println!("Wrote {} tiles to {:?}", written, out_dir);
        }
    }

    Ok(())
}
