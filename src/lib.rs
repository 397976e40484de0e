pub mod catalog;
pub mod error;
pub mod fetch_plan;
pub mod image_selection;
pub mod raster;
pub mod report;
pub mod signing;
