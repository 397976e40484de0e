use anyhow::Result;
use std::path::PathBuf;

extern crate band_fetch;
use band_fetch::catalog::Catalog;
use band_fetch::error::FetchError;
use band_fetch::fetch_plan::generate_fetch_plan;
use band_fetch::image_selection::{taiwan_red_template, ImageSelection};
use band_fetch::report;
use band_fetch::signing::Signer;

/// Red band (B04) of the newest matching Sentinel-2 scene over Taiwan,
/// saved as `taiwan_image_new.tif`.
#[tokio::main]
async fn main() -> Result<()> {
    let output_dir = PathBuf::from("./outputs/taiwan_red");

    let selection = ImageSelection::from_template(&taiwan_red_template());

    let catalog = Catalog::planetary_computer()?;
    let plan = match generate_fetch_plan(&catalog, &selection, &output_dir).await {
        Ok(plan) => plan,
        Err(err) => {
            if matches!(err.downcast_ref::<FetchError>(), Some(FetchError::EmptyResult)) {
                report::no_matching_imagery();
                std::process::exit(1);
            }
            return Err(err);
        }
    };

    std::fs::create_dir_all(&output_dir)?;

    let signer = Signer::planetary_computer()?;
    let _ = plan.execute(&signer).await?;

    Ok(())
}
