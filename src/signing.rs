use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use stac::{Asset, Item};
use url::Url;

use crate::error::FetchError;

pub const PLANETARY_COMPUTER_SAS_API: &str = "https://planetarycomputer.microsoft.com/api/sas/v1";

const SIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// An authorized, time-limited handle to one band's raster resource.
/// Consumed immediately by the raster fetch; never persisted.
#[derive(Debug)]
pub struct SignedAssetRef {
    pub item_id: String,
    pub url: Url,
}

#[derive(Deserialize)]
struct SignResponse {
    href: String,
}

/// Look up the asset holding the named band in an item's asset mapping.
pub fn resolve_asset<'a>(item: &'a Item, band: &str) -> Result<&'a Asset, FetchError> {
    item.assets.get(band).ok_or_else(|| FetchError::MissingBand {
        item_id: item.id.clone(),
        band: band.to_string(),
    })
}

/// Client for the asset signing service. Exchanges an unsigned asset href
/// for a fetchable URL carrying a short-lived authorization token.
pub struct Signer {
    client: reqwest::Client,
    endpoint: String,
}

impl Signer {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SIGN_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn planetary_computer() -> Result<Self> {
        Self::new(PLANETARY_COMPUTER_SAS_API)
    }

    pub async fn sign_href(&self, item_id: &str, href: &str) -> Result<SignedAssetRef, FetchError> {
        let url = format!("{}/sign", self.endpoint);
        let response: SignResponse = self
            .client
            .get(url)
            .query(&[("href", href)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(SignedAssetRef {
            item_id: item_id.to_string(),
            url: Url::parse(&response.href)?,
        })
    }

    pub async fn sign(&self, item: &Item, band: &str) -> Result<SignedAssetRef, FetchError> {
        let asset = resolve_asset(item, band)?;
        self.sign_href(&item.id, &asset.href).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_asset() {
        let mut item = Item::new("S2A_MSIL2A_20230315");
        item.assets.insert(
            "B04".to_string(),
            Asset::new("https://example.com/B04.tif"),
        );

        let asset = resolve_asset(&item, "B04").unwrap();
        assert_eq!(asset.href, "https://example.com/B04.tif");
    }

    #[test]
    fn test_resolve_asset_missing_band() {
        let item = Item::new("S2A_MSIL2A_20230315");
        let err = resolve_asset(&item, "B04").unwrap_err();
        assert!(matches!(
            err,
            FetchError::MissingBand { ref band, .. } if band == "B04"
        ));
    }
}
