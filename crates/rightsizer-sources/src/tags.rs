//! Instance tag lookup service.
//!
//! One call covers one batch of instance ids; the HTTP implementation
//! paginates within the batch response. Instances deleted between
//! recommendation generation and enrichment are simply absent from the
//! result, and the enricher treats that as a per-record condition, never a
//! batch failure.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;

use rightsizer_types::{Result, RightsizerError};

/// Map of instance id to its tag key/value map.
pub type TagMap = HashMap<String, BTreeMap<String, String>>;

#[async_trait]
pub trait TagService: Send + Sync {
    /// Fetch tags for one batch of instance ids. Ids unknown to the
    /// service are absent from the returned map.
    async fn tags_for(&self, instance_ids: &[String]) -> Result<TagMap>;
}

// ---------------------------------------------------------------------------
// HttpTagService
// ---------------------------------------------------------------------------

/// Batched tag lookup over HTTP.
///
/// `POST {base}/instances/tags` with
/// `{ "instance_ids": [...], "page_size": N, "page_token": "..." }`
/// returning `{ "instances": [{ "instance_id": ..., "tags": {..} }], "next_token": ... }`.
pub struct HttpTagService {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl HttpTagService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            page_size: 100,
        }
    }
}

#[async_trait]
impl TagService for HttpTagService {
    async fn tags_for(&self, instance_ids: &[String]) -> Result<TagMap> {
        let mut tags = TagMap::new();
        if instance_ids.is_empty() {
            return Ok(tags);
        }

        let mut page_token: Option<String> = None;
        loop {
            let mut body = serde_json::json!({
                "instance_ids": instance_ids,
                "page_size": self.page_size,
            });
            if let Some(token) = &page_token {
                body["page_token"] = serde_json::json!(token);
            }

            let resp = self
                .client
                .post(format!("{}/instances/tags", self.base_url))
                .json(&body)
                .send()
                .await
                .map_err(|e| tag_error(0, e.to_string(), true))?;

            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| tag_error(0, e.to_string(), true))?;

            if !status.is_success() {
                let retryable = status.is_server_error() || status.as_u16() == 429;
                return Err(tag_error(status.as_u16(), text, retryable));
            }

            let page: RawTagPage = serde_json::from_str(&text)
                .map_err(|e| tag_error(status.as_u16(), format!("invalid tag JSON: {e}"), false))?;

            for instance in page.instances {
                tags.insert(instance.instance_id, instance.tags);
            }

            match page.next_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(tags)
    }
}

fn tag_error(status: u16, message: String, retryable: bool) -> RightsizerError {
    RightsizerError::ProviderError {
        provider: "tag-service".into(),
        status,
        message,
        retryable,
    }
}

#[derive(Debug, Deserialize)]
struct RawTagPage {
    #[serde(default)]
    instances: Vec<RawTaggedInstance>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTaggedInstance {
    instance_id: String,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
