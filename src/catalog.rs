use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use stac::{Item, ItemCollection};

use crate::error::FetchError;

pub const PLANETARY_COMPUTER_API: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One query against the catalog. Serializes to the JSON body the STAC
/// `/search` endpoint accepts. Bounding box order is west, south, east,
/// north; the remote service validates geometry, not us.
#[derive(Debug, Clone, Serialize)]
pub struct SearchCriteria {
    collections: Vec<String>,
    bbox: [f64; 4],
    datetime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
}

impl SearchCriteria {
    pub fn new(collection: &str, bbox: [f64; 4], datetime: &str) -> Self {
        Self {
            collections: vec![collection.to_string()],
            bbox,
            datetime: datetime.to_string(),
            query: None,
            limit: None,
        }
    }

    /// Keep only scenes whose `eo:cloud_cover` is strictly below the ceiling.
    pub fn with_cloud_cover_lt(mut self, ceiling: f64) -> Self {
        self.query = Some(serde_json::json!({"eo:cloud_cover": {"lt": ceiling}}));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Handle to a remote STAC search endpoint. Construct once per run.
pub struct Catalog {
    client: reqwest::Client,
    endpoint: String,
}

impl Catalog {
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(SEARCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn planetary_computer() -> Result<Self> {
        Self::new(PLANETARY_COMPUTER_API)
    }

    /// Execute the search and materialize the result set in the order the
    /// service returned it.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Item>> {
        let url = format!("{}/search", self.endpoint);
        let item_collection: ItemCollection = self
            .client
            .post(url)
            .json(criteria)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(item_collection.items)
    }
}

/// Take the first `limit` items. An empty result set is an error so that
/// nothing downstream ever sees an empty selection.
pub fn select(mut items: Vec<Item>, limit: usize) -> Result<Vec<Item>, FetchError> {
    if items.is_empty() {
        return Err(FetchError::EmptyResult);
    }
    items.truncate(limit);
    Ok(items)
}

/// Capture date of an item as `YYYYMMDD`, taken from its `datetime`
/// property.
pub fn capture_date(item: &Item) -> Result<String, FetchError> {
    let datetime = item
        .properties
        .datetime
        .ok_or_else(|| FetchError::MissingDatetime(item.id.clone()))?;
    Ok(datetime.format("%Y%m%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn mock_item(id: &str, datetime: &str) -> Item {
        let mut item = Item::new(id);
        item.properties.datetime = Some(
            DateTime::parse_from_rfc3339(datetime)
                .unwrap()
                .with_timezone(&Utc),
        );
        item
    }

    #[test]
    fn test_criteria_body() {
        let criteria = SearchCriteria::new(
            "sentinel-2-l2a",
            [120.0, 21.5, 122.0, 25.5],
            "2023-01-01/2023-12-31",
        )
        .with_cloud_cover_lt(20.0)
        .with_limit(4);

        let body = serde_json::to_value(&criteria).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "collections": ["sentinel-2-l2a"],
                "bbox": [120.0, 21.5, 122.0, 25.5],
                "datetime": "2023-01-01/2023-12-31",
                "query": {"eo:cloud_cover": {"lt": 20.0}},
                "limit": 4,
            })
        );
    }

    #[test]
    fn test_criteria_body_omits_optionals() {
        let criteria =
            SearchCriteria::new("sentinel-2-l2a", [0.0, 0.0, 1.0, 1.0], "2023-01-01/2023-12-31");
        let body = serde_json::to_value(&criteria).unwrap();
        assert!(body.get("query").is_none());
        assert!(body.get("limit").is_none());
    }

    #[test]
    fn test_select_takes_at_most_limit() {
        let items = vec![
            mock_item("a", "2023-03-15T02:30:21Z"),
            mock_item("b", "2023-03-10T02:30:21Z"),
            mock_item("c", "2023-03-05T02:30:21Z"),
        ];
        let selected = select(items, 2).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].id, "a");
        assert_eq!(selected[1].id, "b");
    }

    #[test]
    fn test_select_takes_all_when_fewer_than_limit() {
        let items = vec![mock_item("a", "2023-03-15T02:30:21Z")];
        let selected = select(items, 4).unwrap();
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn test_select_empty_is_an_error() {
        let result = select(vec![], 4);
        assert!(matches!(result, Err(FetchError::EmptyResult)));
    }

    #[test]
    fn test_capture_date() {
        let item = mock_item("a", "2023-03-15T02:30:21.024000Z");
        assert_eq!(capture_date(&item).unwrap(), "20230315");
    }

    #[test]
    fn test_capture_date_missing() {
        let mut item = Item::new("a");
        item.properties.datetime = None;
        assert!(matches!(
            capture_date(&item),
            Err(FetchError::MissingDatetime(_))
        ));
    }
}
