// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Bucket Search Index
 * One OpenSearch document per bucket, keyed by bucket id
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::errors::IndexError;
use crate::types::{BucketRecord, CloudAccount, FindingType, ScanResult, Severity};

/// Maximum documents returned by a search query
pub const PAGE_SIZE: usize = 50;

/// Indexed view of a bucket's latest scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDocument {
    pub org_id: String,
    pub bucket_id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub region: String,
    pub is_public: bool,
    pub severity: Severity,
    pub finding_types: Vec<FindingType>,
    pub last_seen_at: DateTime<Utc>,
}

impl BucketDocument {
    /// `finding_types` carries only this cycle's findings so stale types drop out
    pub fn from_scan(account: &CloudAccount, bucket: &BucketRecord, result: &ScanResult) -> Self {
        Self {
            org_id: account.org_id.clone(),
            bucket_id: bucket.id,
            account_id: account.id,
            name: bucket.name.clone(),
            region: bucket.region.clone(),
            is_public: result.is_public,
            severity: result.max_severity,
            finding_types: result.finding_types(),
            last_seen_at: bucket.last_seen_at,
        }
    }
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn ping(&self) -> Result<(), IndexError>;

    /// Replace the document for `document.bucket_id`
    async fn upsert_document(&self, document: &BucketDocument) -> Result<(), IndexError>;
}

/// OpenSearch REST client
pub struct OpenSearchIndexer {
    client: Client,
    base_url: String,
    index: String,
    credentials: Option<(String, String)>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: BucketDocument,
}

impl OpenSearchIndexer {
    pub fn new(config: &SearchConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| IndexError::Configuration(e.to_string()))?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            credentials,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, IndexError> {
        let request = match &self.credentials {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        };

        request.send().await.map_err(|e| IndexError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn expect_success(response: Response, url: &str) -> Result<Response, IndexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(IndexError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    /// Create the index with the bucket mapping if it does not exist.
    /// Returns true when the index was created.
    pub async fn ensure_index(&self) -> Result<bool, IndexError> {
        let url = self.index_url();

        let head = self.send(self.client.head(&url), &url).await?;
        if head.status().is_success() {
            debug!(index = %self.index, "Search index already exists");
            return Ok(false);
        }
        if head.status() != StatusCode::NOT_FOUND {
            return Err(IndexError::Status {
                url,
                status: head.status().as_u16(),
                body: String::new(),
            });
        }

        let response = self
            .send(self.client.put(&url).json(&index_mapping()), &url)
            .await?;
        Self::expect_success(response, &url).await?;

        info!(index = %self.index, "Created search index");
        Ok(true)
    }

    /// Documents for one organization, newest first. An empty query matches all.
    pub async fn search(
        &self,
        org_id: &str,
        query: Option<&str>,
    ) -> Result<Vec<BucketDocument>, IndexError> {
        let url = format!("{}/_search", self.index_url());
        let body = search_body(org_id, query);

        let response = self.send(self.client.post(&url).json(&body), &url).await?;
        let response = Self::expect_success(response, &url).await?;

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;

        Ok(parsed.hits.hits.into_iter().map(|hit| hit.source).collect())
    }
}

#[async_trait]
impl SearchIndex for OpenSearchIndexer {
    async fn ping(&self) -> Result<(), IndexError> {
        let url = self.base_url.clone();
        let response = self.send(self.client.get(&url), &url).await?;
        Self::expect_success(response, &url).await?;
        Ok(())
    }

    async fn upsert_document(&self, document: &BucketDocument) -> Result<(), IndexError> {
        let url = format!("{}/_doc/{}", self.index_url(), document.bucket_id);
        let response = self
            .send(self.client.put(&url).json(document), &url)
            .await?;
        Self::expect_success(response, &url).await?;

        debug!(bucket_id = %document.bucket_id, "Indexed bucket document");
        Ok(())
    }
}

/// Field mapping for the bucket index
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "orgId": { "type": "keyword" },
                "bucketId": { "type": "keyword" },
                "accountId": { "type": "keyword" },
                "name": {
                    "type": "text",
                    "fields": { "raw": { "type": "keyword" } }
                },
                "region": { "type": "keyword" },
                "isPublic": { "type": "boolean" },
                "severity": { "type": "keyword" },
                "findingTypes": { "type": "keyword" },
                "lastSeenAt": { "type": "date" }
            }
        }
    })
}

pub fn search_body(org_id: &str, query: Option<&str>) -> Value {
    let query = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => json!({
            "bool": {
                "filter": [{ "term": { "orgId": org_id } }],
                "must": [{ "query_string": { "query": q } }]
            }
        }),
        None => json!({ "term": { "orgId": org_id } }),
    };

    json!({
        "size": PAGE_SIZE,
        "query": query,
        "sort": [{ "lastSeenAt": "desc" }]
    })
}
