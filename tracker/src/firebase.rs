// Firebase Realtime Database over its REST API. Each record is stored as the
// JSON value of the node `<collection>/<KEY>`; a missing node reads as `null`.
use crate::backend::{BackendError, BackendProvider};
use crate::normalize::TrackingKey;
use crate::types::TrackingRecord;
use async_trait::async_trait;
use url::Url;

pub const DEFAULT_COLLECTION: &str = "tracking";
pub const DEFAULT_FALLBACK_COLLECTION: &str = "shipments";

pub struct FirebaseProvider {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl FirebaseProvider {
    pub fn new(base_url: &Url, auth_token: &str) -> Self {
        FirebaseProvider {
            client: reqwest::Client::new(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
        }
    }

    fn node_url(&self, resource: &str, key: &TrackingKey) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!(
            "{}/{}/{key}.json",
            self.base_url,
            resource.trim_matches('/')
        ))?;
        url.query_pairs_mut().append_pair("auth", &self.auth_token);
        Ok(url)
    }
}

#[async_trait]
impl BackendProvider for FirebaseProvider {
    const NAME: &'static str = "firebase";

    async fn lookup(
        &self,
        resource: &str,
        key: &TrackingKey,
    ) -> Result<Option<TrackingRecord>, BackendError> {
        let url = self.node_url(resource, key)?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Status {
                resource: resource.to_string(),
                status: response.status(),
            });
        }

        Ok(response.json::<Option<TrackingRecord>>().await?)
    }

    async fn upsert(
        &self,
        resource: &str,
        key: &TrackingKey,
        record: &TrackingRecord,
    ) -> Result<(), BackendError> {
        let url = self.node_url(resource, key)?;
        let response = self.client.put(url).json(record).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Status {
                resource: resource.to_string(),
                status: response.status(),
            });
        }
        Ok(())
    }
}
