use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

mod catalog;
mod error;
mod fetch_plan;
mod image_selection;
mod raster;
mod report;
mod signing;

use catalog::Catalog;
use error::FetchError;
use fetch_plan::{generate_fetch_plan, FetchSummary};
use image_selection::{taiwan_template, ImageSelection};
use signing::Signer;

#[derive(Parser, Debug)]
#[command(about = "Fetch one Sentinel-2 band per matching scene as a local LZW GeoTIFF")]
struct Cli {
    /// Image selection TOML; defaults to the built-in Taiwan parameters
    #[arg(short, long)]
    selection: Option<PathBuf>,

    #[arg(short, long, default_value = "./outputs")]
    output_dir: PathBuf,
}

async fn run(cli: &Cli) -> Result<FetchSummary> {
    let selection = match &cli.selection {
        Some(path) => ImageSelection::read(path)?,
        None => ImageSelection::from_template(&taiwan_template()),
    };

    let catalog = Catalog::planetary_computer()?;
    let signer = Signer::planetary_computer()?;

    let plan = generate_fetch_plan(&catalog, &selection, &cli.output_dir).await?;

    fs::create_dir_all(&cli.output_dir)?;
    plan.write(cli.output_dir.join("fetch_plan.json"))?;

    plan.execute(&signer).await
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(summary) => {
            if summary.completed == 0 && summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            if matches!(err.downcast_ref::<FetchError>(), Some(FetchError::EmptyResult)) {
                report::no_matching_imagery();
            } else {
                eprintln!("Error: {:#}", err);
            }
            ExitCode::FAILURE
        }
    }
}
