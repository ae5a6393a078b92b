//! Supabase (PostgREST) site backend

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::error::StorageError;
use crate::site::{Site, SiteId};
use crate::storage::SiteBackend;

/// Connection settings for the remote site table
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Anon or service key
    pub api_key: String,
    /// Table holding one row per site
    pub table: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: "sites".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `SUPABASE_URL`, `SUPABASE_ANON_KEY` and optional `SUPABASE_TABLE`.
    ///
    /// Returns `None` when the remote is not configured.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok().filter(|v| !v.is_empty())?;
        let api_key = std::env::var("SUPABASE_ANON_KEY").ok().filter(|v| !v.is_empty())?;

        let mut config = Self::new(url, api_key);
        if let Ok(table) = std::env::var("SUPABASE_TABLE") {
            if !table.is_empty() {
                config.table = table;
            }
        }
        Some(config)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

/// Site table accessed through the PostgREST API
pub struct SupabaseBackend {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl SupabaseBackend {
    pub fn new(config: RemoteConfig) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .default_headers(auth_headers(&config.api_key)?)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn row_url(&self, id: &SiteId) -> String {
        format!("{}?id=eq.{}", self.config.table_url(), id)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Remote {
            status: status.as_u16(),
            body,
        })
    }
}

fn auth_headers(api_key: &str) -> Result<HeaderMap, StorageError> {
    let invalid = |_: InvalidHeaderValue| StorageError::Config("API key is not a valid header value".to_string());

    let mut headers = HeaderMap::new();
    headers.insert("apikey", HeaderValue::from_str(api_key).map_err(invalid)?);
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid)?,
    );
    Ok(headers)
}

#[async_trait]
impl SiteBackend for SupabaseBackend {
    async fn upsert(&self, site: &Site) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.config.table_url())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(site)
            .send()
            .await?;

        Self::check_status(response).await?;
        debug!(site_id = %site.id, "Upserted site row");
        Ok(())
    }

    async fn select(&self, id: &SiteId) -> Result<Option<Site>, StorageError> {
        let response = self
            .client
            .get(format!("{}&select=*", self.row_url(id)))
            .send()
            .await?;

        let rows: Vec<Site> = Self::check_status(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: &SiteId) -> Result<(), StorageError> {
        let response = self.client.delete(self.row_url(id)).send().await?;

        Self::check_status(response).await?;
        debug!(site_id = %id, "Deleted site row");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Site>, StorageError> {
        let response = self
            .client
            .get(format!("{}?select=*", self.config.table_url()))
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}
