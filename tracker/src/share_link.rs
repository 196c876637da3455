//! Share tokens and deep links.
//!
//! A share token is the record's JSON, deflated and encoded as unpadded
//! base64url, so it can be used as a query-string value without escaping.
//! A deep link carries either a token (`?data=`), a plain code (`?code=`) or,
//! when there is no query string at all, a `BR<digits>` path segment.
use crate::metrics_defs::SHARE_TOKEN_REJECTED;
use crate::normalize::TrackingKey;
use crate::types::TrackingRecord;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use shared::counter;
use std::io::{self, Read, Write};
use url::Url;

pub const DATA_PARAM: &str = "data";
pub const CODE_PARAM: &str = "code";

const MAX_TOKEN_LEN: usize = 64 * 1024;
const MAX_PAYLOAD_BYTES: u64 = 512 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum ShareTokenError {
    #[error("token is empty")]
    Empty,
    #[error("token is too long")]
    TooLong,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("could not (de)compress payload: {0}")]
    Compression(#[from] io::Error),
    #[error("decompressed payload is too large")]
    TooLarge,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes a record into a share token. Records whose token `decode` would
/// reject for its size are refused with `TooLarge` or `TooLong`.
pub fn encode(record: &TrackingRecord) -> Result<String, ShareTokenError> {
    let json = serde_json::to_vec(record)?;
    if json.len() as u64 > MAX_PAYLOAD_BYTES {
        return Err(ShareTokenError::TooLarge);
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;

    let token = URL_SAFE_NO_PAD.encode(compressed);
    if token.len() > MAX_TOKEN_LEN {
        return Err(ShareTokenError::TooLong);
    }
    Ok(token)
}

/// Decodes a share token. Anything that is not a well-formed token yields
/// `None`, which callers treat as "no shared data".
pub fn decode(token: &str) -> Option<TrackingRecord> {
    match parse_token(token) {
        Ok(record) => Some(record),
        Err(err) => {
            tracing::debug!("Ignoring share token: {err}");
            counter!(SHARE_TOKEN_REJECTED).increment(1);
            None
        }
    }
}

fn parse_token(token: &str) -> Result<TrackingRecord, ShareTokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ShareTokenError::Empty);
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(ShareTokenError::TooLong);
    }

    let compressed = URL_SAFE_NO_PAD.decode(token.as_bytes())?;

    let mut json = Vec::new();
    DeflateDecoder::new(compressed.as_slice())
        .take(MAX_PAYLOAD_BYTES + 1)
        .read_to_end(&mut json)?;
    if json.len() as u64 > MAX_PAYLOAD_BYTES {
        return Err(ShareTokenError::TooLarge);
    }

    Ok(serde_json::from_slice(&json)?)
}

/// What a deep link asks the caller to show.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkTarget {
    /// A full record embedded in the link. Shown as is, without any lookup.
    Snapshot(TrackingRecord),
    /// A code to resolve live.
    Code(TrackingKey),
}

/// Builds a link to `base` embedding the whole record. Any query string
/// already present on `base` is replaced.
pub fn build_share_link(base: &Url, record: &TrackingRecord) -> Result<Url, ShareTokenError> {
    let token = encode(record)?;
    let mut url = base.clone();
    url.query_pairs_mut().clear().append_pair(DATA_PARAM, &token);
    Ok(url)
}

/// Builds a link to `base` that triggers a live lookup of `key`.
pub fn build_code_link(base: &Url, key: &TrackingKey) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair(CODE_PARAM, key.as_str());
    url
}

pub fn parse_link(url: &Url) -> Option<LinkTarget> {
    let mut data = None;
    let mut code = None;
    let mut has_query = false;

    for (name, value) in url.query_pairs() {
        has_query = true;
        match name.as_ref() {
            DATA_PARAM if data.is_none() => data = Some(value.into_owned()),
            CODE_PARAM if code.is_none() => code = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(record) = data.as_deref().and_then(decode) {
        return Some(LinkTarget::Snapshot(record));
    }

    if let Some(code) = code {
        let key = TrackingKey::new(&code);
        return (!key.is_empty()).then_some(LinkTarget::Code(key));
    }

    if has_query {
        return None;
    }

    let key = TrackingKey::new(url.path().trim_matches('/'));
    key.is_path_code().then_some(LinkTarget::Code(key))
}
