use anyhow::Result;
use std::path::PathBuf;

extern crate band_fetch;
use band_fetch::catalog::Catalog;
use band_fetch::error::FetchError;
use band_fetch::fetch_plan::generate_fetch_plan;
use band_fetch::image_selection::{taiwan_template, ImageSelection};
use band_fetch::report;
use band_fetch::signing::Signer;

/// NIR band (B08) of the first four Sentinel-2 scenes over Taiwan in 2023,
/// one `output_image_<YYYYMMDD>.tif` per scene.
#[tokio::main]
async fn main() -> Result<()> {
    let output_dir = PathBuf::from("./outputs/taiwan_nir");

    let selection = ImageSelection::from_template(&taiwan_template());

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
    plan.write(output_dir.join("fetch_plan.json"))?;

    let signer = Signer::planetary_computer()?;
    let _ = plan.execute(&signer).await?;

    Ok(())
}
