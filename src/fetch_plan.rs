use anyhow::Result;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use stac::Item;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{capture_date, select, Catalog};
use crate::error::FetchError;
use crate::image_selection::ImageSelection;
use crate::raster;
use crate::report;
use crate::signing::{resolve_asset, Signer};

/// One band of one scene, resolved to an output path. The href is the
/// unsigned asset reference; signing happens at execution time so a plan
/// written to disk does not embed expiring tokens.
#[derive(Deserialize, Serialize, Debug)]
pub struct FetchTask {
    item_id: String,
    capture_date: String,
    band: String,
    href: String,
    output: PathBuf,
}

impl FetchTask {
    pub fn new(item_id: &str, capture_date: &str, band: &str, href: &str, output: &Path) -> Self {
        FetchTask {
            item_id: item_id.to_string(),
            capture_date: capture_date.to_string(),
            band: band.to_string(),
            href: href.to_string(),
            output: output.to_path_buf(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct FetchPlan {
    tasks: Vec<FetchTask>,
}

#[derive(Debug, Default)]
pub struct FetchSummary {
    pub completed: usize,
    pub failed: usize,
}

impl FetchPlan {
    pub fn new(tasks: Vec<FetchTask>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[FetchTask] {
        &self.tasks
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let plan: Self = serde_json::from_str(&content)?;
        Ok(plan)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Run the tasks strictly one at a time in plan order. A failed task is
    /// reported and counted; the batch carries on with the next one.
    pub async fn execute(&self, signer: &Signer) -> Result<FetchSummary> {
        let client = reqwest::Client::new();
        let mut summary = FetchSummary::default();

        for task in self.tasks.iter() {
            info!(
                "fetching band {} of item {} -> {}",
                task.band,
                task.item_id,
                task.output.display()
            );

            let fetched = match fetch_one(signer, &client, task).await {
                Ok(()) => true,
                Err(err) => {
                    warn!("item {} failed: {}", task.item_id, err);
                    false
                }
            };

            if report::item_outcome(&task.output, fetched) {
                summary.completed += 1;
            } else {
                summary.failed += 1;
            }
        }

        report::batch_summary(summary.completed, summary.failed);
        Ok(summary)
    }
}

async fn fetch_one(
    signer: &Signer,
    client: &reqwest::Client,
    task: &FetchTask,
) -> Result<(), FetchError> {
    if let Some(parent) = task.output.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let signed = signer.sign_href(&task.item_id, &task.href).await?;
    raster::fetch_and_write(client, &signed, &task.output).await?;
    if !task.output.exists() {
        return Err(FetchError::PostWriteVerification {
            path: task.output.clone(),
        });
    }
    Ok(())
}

/// Turn selected items into tasks. An item missing the requested band or a
/// capture datetime is skipped with a reported failure; the remaining items
/// still produce tasks.
pub fn build_tasks(
    selection: &ImageSelection,
    items: &[Item],
    output_dir: &Path,
) -> Vec<FetchTask> {
    let band = selection.band();
    let mut tasks: Vec<FetchTask> = vec![];

    for item in items {
        let date = match capture_date(item) {
            Ok(date) => date,
            Err(err) => {
                report::item_skipped(&item.id, &err);
                continue;
            }
        };
        let asset = match resolve_asset(item, band) {
            Ok(asset) => asset,
            Err(err) => {
                report::item_skipped(&item.id, &err);
                continue;
            }
        };

        let output = selection.output_path(output_dir, &date);
        tasks.push(FetchTask::new(&item.id, &date, band, &asset.href, &output));
    }

    tasks
}

/// Search the catalog and lay out one task per selected scene. Fails with
/// `EmptyResult` when nothing matched, before any task is attempted.
pub async fn generate_fetch_plan(
    catalog: &Catalog,
    selection: &ImageSelection,
    output_dir: &Path,
) -> Result<FetchPlan> {
    let criteria = selection.criteria();
    let items = catalog.search(&criteria).await?;
    let selected = select(items, selection.limit())?;

    Ok(FetchPlan::new(build_tasks(selection, &selected, output_dir)))
}
