use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "requests",
    metric_type: MetricType::Counter,
    description: "Relay requests handled. Tagged with method, outcome.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with outcome.",
};

pub const DELIVERY_DURATION: MetricDef = MetricDef {
    name: "delivery.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting on the webhook in seconds. Tagged with status.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, REQUEST_DURATION, DELIVERY_DURATION];
