use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Inbound request duration in seconds. Tagged with status, translator.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of inbound requests currently being processed",
};

pub const BACKEND_ERRORS: MetricDef = MetricDef {
    name: "backend.errors",
    metric_type: MetricType::Counter,
    description: "Failed backend calls. Tagged with kind.",
};

pub const QUERY_ERRORS: MetricDef = MetricDef {
    name: "query.errors",
    metric_type: MetricType::Counter,
    description: "Inbound queries rejected as malformed",
};

pub const TRANSFORM_ERRORS: MetricDef = MetricDef {
    name: "transform.errors",
    metric_type: MetricType::Counter,
    description: "Backend results that could not be translated",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    BACKEND_ERRORS,
    QUERY_ERRORS,
    TRANSFORM_ERRORS,
];
