use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("ai-medical-reports"));

// --- Generative backend ---

pub static GEN_AI_TOKEN_USAGE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Number of tokens used per LLM call")
        .with_unit("{token}")
        .build()
});

pub static GEN_AI_OPERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("Duration of LLM operations in seconds")
        .with_unit("s")
        .build()
});

pub static GEN_AI_RETRY_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.retry.count")
        .with_description("Number of LLM call retries")
        .with_unit("{retry}")
        .build()
});

pub static GEN_AI_FALLBACK_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.fallback.count")
        .with_description("Number of LLM fallback activations")
        .with_unit("{fallback}")
        .build()
});

pub static GEN_AI_ERROR_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.error.count")
        .with_description("Number of LLM call errors")
        .with_unit("{error}")
        .build()
});

// --- Reports ---

pub static REPORTS_CREATED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("reports.created")
        .with_description("Total reports created")
        .build()
});

pub static REPORTS_UPDATED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("reports.updated")
        .with_description("Total reports updated")
        .build()
});

pub static REPORTS_REGENERATED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("reports.regenerated")
        .with_description("Total report bodies regenerated by the generative backend")
        .build()
});

pub static REPORTS_DELETED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("reports.deleted")
        .with_description("Total reports deleted")
        .build()
});

pub static USERS_REGISTERED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("users.registered")
        .with_description("Total users registered")
        .build()
});

// --- Blob store ---

pub static BLOB_VERIFY_ATTEMPTS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("blob.verify.attempts")
        .with_description("Read-back attempts needed to verify a blob write")
        .with_unit("{attempt}")
        .with_boundaries(vec![1.0, 2.0, 3.0, 4.0, 5.0, 8.0, 13.0])
        .build()
});

pub static BLOB_VERIFY_EXHAUSTED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("blob.verify.exhausted")
        .with_description("Blob writes that never verified within the retry budget")
        .build()
});

// --- HTTP ---

pub static HTTP_REQUESTS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("http.requests.total")
        .with_description("Total number of HTTP requests")
        .with_unit("{request}")
        .build()
});

pub static HTTP_REQUEST_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("http.request.duration")
        .with_description("HTTP request duration in milliseconds")
        .with_unit("ms")
        .with_boundaries(vec![
            1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
        ])
        .build()
});
