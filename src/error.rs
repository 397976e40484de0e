use std::path::PathBuf;
use thiserror::Error;

/// Failure modes of the fetch pipeline.
///
/// `EmptyResult` ends the whole run; everything else is scoped to a single
/// item and lets the batch continue with the remaining tasks.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no matching imagery for the given search criteria")]
    EmptyResult,

    #[error("band '{band}' is not an asset of item '{item_id}'")]
    MissingBand { item_id: String, band: String },

    #[error("item '{0}' has no capture datetime")]
    MissingDatetime(String),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("raster codec failure: {0}")]
    Codec(#[from] tiff::TiffError),

    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("output file missing after write: {}", .path.display())]
    PostWriteVerification { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
