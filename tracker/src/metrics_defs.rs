//! Metrics definitions for the tracker.

use shared::metrics_defs::{MetricDef, MetricType};

pub const BACKEND_FETCH_HIT: MetricDef = MetricDef {
    name: "backend.fetch.hit",
    metric_type: MetricType::Counter,
    description: "Remote lookups that returned a record, tagged by provider and resource",
};

pub const BACKEND_FETCH_MISS: MetricDef = MetricDef {
    name: "backend.fetch.miss",
    metric_type: MetricType::Counter,
    description: "Remote lookups that completed without a row, tagged by provider and resource",
};

pub const BACKEND_FETCH_ERROR: MetricDef = MetricDef {
    name: "backend.fetch.error",
    metric_type: MetricType::Counter,
    description: "Remote lookups that failed, tagged by provider and resource",
};

pub const BACKEND_UPSERT_SUCCESS: MetricDef = MetricDef {
    name: "backend.upsert.success",
    metric_type: MetricType::Counter,
    description: "Remote writes accepted by a provider",
};

pub const BACKEND_UPSERT_FAILURE: MetricDef = MetricDef {
    name: "backend.upsert.failure",
    metric_type: MetricType::Counter,
    description: "Remote writes rejected by a provider or failed in transport",
};

pub const BACKEND_REQUEST_DURATION: MetricDef = MetricDef {
    name: "backend.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent on one remote request in seconds",
};

pub const LOCAL_CACHE_SEEDED: MetricDef = MetricDef {
    name: "local_cache.seeded",
    metric_type: MetricType::Counter,
    description: "Number of times an empty local cache was initialized with the seed set",
};

pub const RESOLUTION_STALE_DISCARDED: MetricDef = MetricDef {
    name: "resolution.stale_discarded",
    metric_type: MetricType::Counter,
    description: "Remote results dropped because a newer resolution superseded them",
};

pub const SHARE_TOKEN_REJECTED: MetricDef = MetricDef {
    name: "share_token.rejected",
    metric_type: MetricType::Counter,
    description: "Share tokens that could not be decoded",
};

pub const ALL_METRICS: &[MetricDef] = &[
    BACKEND_FETCH_HIT,
    BACKEND_FETCH_MISS,
    BACKEND_FETCH_ERROR,
    BACKEND_UPSERT_SUCCESS,
    BACKEND_UPSERT_FAILURE,
    BACKEND_REQUEST_DURATION,
    LOCAL_CACHE_SEEDED,
    RESOLUTION_STALE_DISCARDED,
    SHARE_TOKEN_REJECTED,
];
