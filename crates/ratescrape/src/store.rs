use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

use crate::types::ProfessorRecord;

pub const DEFAULT_TABLE: &str = "professors";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Store responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Invalid store URL: {0}")]
    InvalidUrl(String),
    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),
}

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub api_key: String,
    pub table: String,
}

impl StoreConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn validate(self) -> Result<Self, StoreError> {
        if self.url.trim().is_empty() {
            return Err(StoreError::MissingConfig("SUPABASE_URL"));
        }
        if self.api_key.trim().is_empty() {
            return Err(StoreError::MissingConfig("SUPABASE_KEY"));
        }
        if self.table.trim().is_empty() {
            return Err(StoreError::MissingConfig("table name"));
        }
        Ok(self)
    }
}

/// Table operations needed to keep professor rows up to date.
///
/// Reads hand back raw rows: the table may hold columns this crate never
/// writes, and NULLs in the ones it does.
#[async_trait]
pub trait ProfessorStore: Send + Sync {
    /// Reads at most one row to check the store is reachable.
    async fn probe(&self) -> Result<Vec<Value>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, record: &ProfessorRecord) -> Result<(), StoreError>;

    /// Overwrites every row whose name equals `record.name`.
    async fn update(&self, record: &ProfessorRecord) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Inserts `record`, or overwrites the existing row with the same name.
///
/// The lookup and the write are separate requests, so two writers racing on
/// the same name can both insert.
pub async fn upsert_professor<S: ProfessorStore + ?Sized>(
    store: &S,
    record: &ProfessorRecord,
) -> Result<UpsertOutcome, StoreError> {
    let existing = store.find_by_name(&record.name).await?;
    if existing.is_empty() {
        store.insert(record).await?;
        Ok(UpsertOutcome::Inserted)
    } else {
        store.update(record).await?;
        Ok(UpsertOutcome::Updated)
    }
}

/// PostgREST client for a Supabase table.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let config = config.validate()?;
        let base = config.url.trim_end_matches('/');
        let endpoint = Url::parse(&format!("{}/rest/v1/{}", base, config.table))
            .map_err(|e| StoreError::InvalidUrl(format!("{}: {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key,
        })
    }

    fn url_with(&self, query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().extend_pairs(query);
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .inspect_err(|e| log::error!("Store HTTP error: {e:?}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(response)
    }

    async fn select(&self, query: &[(&str, &str)]) -> Result<Vec<Value>, StoreError> {
        let url = self.url_with(query);
        log::debug!("GET {}", url);
        let rows = self
            .send(self.client.get(url))
            .await?
            .json::<Vec<Value>>()
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ProfessorStore for SupabaseStore {
    async fn probe(&self) -> Result<Vec<Value>, StoreError> {
        self.select(&[("select", "*"), ("limit", "1")]).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Value>, StoreError> {
        let filter = format!("eq.{name}");
        self.select(&[("select", "*"), ("name", &filter)]).await
    }

    async fn insert(&self, record: &ProfessorRecord) -> Result<(), StoreError> {
        log::debug!("POST {} ({})", self.endpoint, record.name);
        self.send(
            self.client
                .post(self.endpoint.clone())
                .header("Prefer", "return=minimal")
                .json(record),
        )
        .await?;
        Ok(())
    }

    async fn update(&self, record: &ProfessorRecord) -> Result<(), StoreError> {
        let filter = format!("eq.{}", record.name);
        let url = self.url_with(&[("name", &filter)]);
        log::debug!("PATCH {}", url);
        self.send(
            self.client
                .patch(url)
                .header("Prefer", "return=minimal")
                .json(record),
        )
        .await?;
        Ok(())
    }
}
