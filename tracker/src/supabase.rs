// Supabase exposes tables through PostgREST. Rows look like
// `{"code": "<KEY>", "data": <record>}` with a unique constraint on `code`.
use crate::backend::{BackendError, BackendProvider};
use crate::normalize::TrackingKey;
use crate::types::TrackingRecord;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_TABLE: &str = "tracking";
pub const DEFAULT_FALLBACK_TABLE: &str = "trackings";

#[derive(Deserialize)]
struct Row {
    data: Option<TrackingRecord>,
}

#[derive(Serialize)]
struct UpsertRow<'a> {
    code: &'a str,
    data: &'a TrackingRecord,
}

pub struct SupabaseProvider {
    client: reqwest::Client,
    rest_url: Url,
    api_key: String,
}

impl SupabaseProvider {
    pub fn new(base_url: &Url, api_key: &str) -> Result<Self, BackendError> {
        let rest_url = Url::parse(&format!(
            "{}/rest/v1/",
            base_url.as_str().trim_end_matches('/')
        ))?;

        Ok(SupabaseProvider {
            client: reqwest::Client::new(),
            rest_url,
            api_key: api_key.to_string(),
        })
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
    }
}

#[async_trait]
impl BackendProvider for SupabaseProvider {
    const NAME: &'static str = "supabase";

    async fn lookup(
        &self,
        resource: &str,
        key: &TrackingKey,
    ) -> Result<Option<TrackingRecord>, BackendError> {
        let mut url = self.rest_url.join(resource)?;
        url.query_pairs_mut()
            .append_pair("select", "data")
            .append_pair("code", &format!("eq.{key}"));

        let response = self.request(reqwest::Method::GET, url).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Status {
                resource: resource.to_string(),
                status: response.status(),
            });
        }

        let rows = response.json::<Vec<Row>>().await?;
        Ok(rows.into_iter().next().and_then(|row| row.data))
    }

    async fn upsert(
        &self,
        resource: &str,
        key: &TrackingKey,
        record: &TrackingRecord,
    ) -> Result<(), BackendError> {
        let mut url = self.rest_url.join(resource)?;
        url.query_pairs_mut().append_pair("on_conflict", "code");

        let body = [UpsertRow {
            code: key.as_str(),
            data: record,
        }];

        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Status {
                resource: resource.to_string(),
                status: response.status(),
            });
        }
        Ok(())
    }
}
