use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use toml;

use crate::catalog::SearchCriteria;

/// One parameterized run of the fetch pipeline, read from a TOML file.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ImageSelection {
    id: String,
    name: String,
    description: String,
    docs: String,
    collection: String,
    bbox: [f64; 4],
    datetime: String,
    band: String,
    cloud_cover_lt: Option<f64>,
    limit: Option<usize>,
    output: OutputNaming,
}

/// How output files are named. `CaptureDate` derives one file per scene from
/// its capture date; two scenes sharing a date resolve last-writer-wins.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum OutputNaming {
    Literal { file_name: String },
    CaptureDate { prefix: String },
}

impl ImageSelection {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let selection: Self = toml::from_str(&content)?;
        Ok(selection)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Self {
        let selection: Self =
            toml::from_str(&table.to_string()).expect("Error serializing template");
        selection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn band(&self) -> &str {
        &self.band
    }

    /// Number of scenes to fetch; the originals take either the first scene
    /// or the first four.
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(1)
    }

    pub fn criteria(&self) -> SearchCriteria {
        let mut criteria = SearchCriteria::new(&self.collection, self.bbox, &self.datetime)
            .with_limit(self.limit());
        if let Some(ceiling) = self.cloud_cover_lt {
            criteria = criteria.with_cloud_cover_lt(ceiling);
        }
        criteria
    }

    pub fn output_path(&self, output_dir: &Path, capture_date: &str) -> PathBuf {
        match &self.output {
            OutputNaming::Literal { file_name } => output_dir.join(file_name),
            OutputNaming::CaptureDate { prefix } => {
                output_dir.join(format!("{}_{}.tif", prefix, capture_date))
            }
        }
    }
}

/// Canonical parameters of the Taiwan Sentinel-2 runs.
pub fn taiwan_template() -> toml::Table {
    toml::toml! {
        id = "planetary-computer.sentinel2l2a.taiwan"

        name = "Sentinel-2 L2A over Taiwan"

        description = "Level 2A product provides atmospherically corrected Surface Reflectance (SR) images,\n\
        derived from the associated Level-1C products. One spectral band per matched scene is\n\
        fetched and re-saved locally as a single-band LZW-compressed GeoTIFF."

        docs = "https://planetarycomputer.microsoft.com/dataset/sentinel-2-l2a"

        collection = "sentinel-2-l2a"
        bbox = [120.0, 21.5, 122.0, 25.5]
        datetime = "2023-01-01/2023-12-31"
        band = "B08"
        cloud_cover_lt = 20.0
        limit = 4

        [output]
        strategy = "capture_date"
        prefix = "output_image"
    }
}

/// Variant of the Taiwan run that grabs the red band of the first matching
/// scene into a fixed file name.
pub fn taiwan_red_template() -> toml::Table {
    let mut table = taiwan_template();
    table.insert("band".to_string(), toml::Value::String("B04".to_string()));
    table.insert("limit".to_string(), toml::Value::Integer(1));
    table.insert(
        "output".to_string(),
        toml::Value::Table(toml::toml! {
            strategy = "literal"
            file_name = "taiwan_image_new.tif"
        }),
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_template() {
        let selection = ImageSelection::from_template(&taiwan_template());
        assert_eq!(selection.id, "planetary-computer.sentinel2l2a.taiwan");
        assert_eq!(selection.band(), "B08");
        assert_eq!(selection.limit(), 4);
        assert_eq!(selection.bbox, [120.0, 21.5, 122.0, 25.5]);
    }

    #[test]
    fn test_write_then_read_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image_selection.toml");
        let selection = ImageSelection::from_template(&taiwan_template());
        selection.write(&path).unwrap();

        let selection = ImageSelection::read(&path).unwrap();
        assert_eq!(selection.id, "planetary-computer.sentinel2l2a.taiwan");
        assert_eq!(selection.collection, "sentinel-2-l2a");
    }

    #[test]
    fn test_limit_defaults_to_one() {
        let mut table = taiwan_template();
        table.remove("limit");
        let selection = ImageSelection::from_template(&table);
        assert_eq!(selection.limit(), 1);
    }

    #[test]
    fn test_capture_date_naming_is_deterministic() {
        let selection = ImageSelection::from_template(&taiwan_template());
        let dir = Path::new("/outputs");
        let path = selection.output_path(dir, "20230315");
        assert_eq!(path, PathBuf::from("/outputs/output_image_20230315.tif"));
        // Re-deriving from the same capture date yields the same path; two
        // scenes sharing a date therefore collide, last writer wins.
        assert_eq!(path, selection.output_path(dir, "20230315"));
    }

    #[test]
    fn test_literal_naming() {
        let mut table = taiwan_template();
        table.remove("output");
        table.insert(
            "output".to_string(),
            toml::Value::Table(toml::toml! {
                strategy = "literal"
                file_name = "taiwan_image_new.tif"
            }),
        );
        let selection = ImageSelection::from_template(&table);
        let path = selection.output_path(Path::new("."), "20230315");
        assert_eq!(path, PathBuf::from("./taiwan_image_new.tif"));
    }
}
