use crate::backend::ResourceNames;
use crate::{firebase, supabase};
use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("empty resource name configured for {0}")]
    EmptyResourceName(&'static str),
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct LocalCache {
    /// Directory the tracking data is persisted in. Kept in memory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Share {
    /// Page that share links point to.
    pub base_url: Option<Url>,
}

/// Supabase connection. The provider stays disabled unless both `url` and
/// `anon_key` are set.
#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Supabase {
    pub url: Option<Url>,
    pub anon_key: Option<String>,
    pub table: Option<String>,
    pub fallback_table: Option<String>,
}

impl Supabase {
    pub fn resources(&self) -> ResourceNames {
        ResourceNames::new(
            self.table.as_deref().unwrap_or(supabase::DEFAULT_TABLE),
            Some(
                self.fallback_table
                    .as_deref()
                    .unwrap_or(supabase::DEFAULT_FALLBACK_TABLE)
                    .to_string(),
            ),
        )
    }
}

/// Firebase Realtime Database connection. Disabled unless both `url` and
/// `auth_token` are set.
#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Firebase {
    pub url: Option<Url>,
    pub auth_token: Option<String>,
    pub collection: Option<String>,
    pub fallback_collection: Option<String>,
}

impl Firebase {
    pub fn resources(&self) -> ResourceNames {
        ResourceNames::new(
            self.collection
                .as_deref()
                .unwrap_or(firebase::DEFAULT_COLLECTION),
            Some(
                self.fallback_collection
                    .as_deref()
                    .unwrap_or(firebase::DEFAULT_FALLBACK_COLLECTION)
                    .to_string(),
            ),
        )
    }
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Cloud {
    /// Turns every remote backend off regardless of the provider settings.
    #[serde(default)]
    pub disabled: bool,
    pub supabase: Option<Supabase>,
    pub firebase: Option<Firebase>,
}

#[derive(Clone, Deserialize, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub local_cache: LocalCache,
    #[serde(default)]
    pub share: Share,
    #[serde(default)]
    pub cloud: Cloud,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let supabase = self.cloud.supabase.iter().flat_map(|s| [&s.table, &s.fallback_table]);
        if supabase.flatten().any(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyResourceName("supabase"));
        }

        let firebase = self
            .cloud
            .firebase
            .iter()
            .flat_map(|f| [&f.collection, &f.fallback_collection]);
        if firebase.flatten().any(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyResourceName("firebase"));
        }

        Ok(())
    }
}
