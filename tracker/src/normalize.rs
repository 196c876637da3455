use serde::{Deserialize, Serialize};
use std::fmt;

const PATH_CODE_PREFIX: &str = "BR";

/// Canonical form of a tracking code. Codes are compared, stored and looked up
/// only through this type, so two inputs refer to the same shipment iff their
/// keys are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TrackingKey(String);

impl TrackingKey {
    pub fn new(raw: &str) -> Self {
        TrackingKey(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True for the `BR` + digits shape used in path-style links.
    pub fn is_path_code(&self) -> bool {
        self.0
            .strip_prefix(PATH_CODE_PREFIX)
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl From<String> for TrackingKey {
    fn from(raw: String) -> Self {
        TrackingKey::new(&raw)
    }
}

impl From<TrackingKey> for String {
    fn from(key: TrackingKey) -> Self {
        key.0
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upper-cases the input and drops everything that is not a letter or digit,
/// e.g. surrounding whitespace, spaces and dashes pasted from a receipt.
pub fn normalize(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}
