use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::sync::{LazyLock, Once};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Webhook outcomes: processed, duplicate, invalid, failed
pub static WEBHOOKS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("stp_webhooks_total", "STP notifications received, by outcome"),
        &["outcome"],
    )
    .expect("valid metric definition")
});

pub static WEBHOOK_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "stp_webhook_duration_seconds",
            "Time spent handling one STP notification",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("valid metric definition")
});

// Backend failures by operation: exists, insert, stats, recent
pub static BACKEND_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("stp_backend_errors_total", "Failed persistence backend calls"),
        &["operation"],
    )
    .expect("valid metric definition")
});

// Partner relay results: delivered, bypassed, failed
pub static PARTNER_FORWARDS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("stp_partner_forwards_total", "Partner API forward attempts"),
        &["result"],
    )
    .expect("valid metric definition")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: [Box<dyn prometheus::core::Collector>; 4] = [
            Box::new(WEBHOOKS_TOTAL.clone()),
            Box::new(WEBHOOK_DURATION.clone()),
            Box::new(BACKEND_ERRORS.clone()),
            Box::new(PARTNER_FORWARDS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::error!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Render the registry in the Prometheus text format.
pub fn metrics_output() -> Result<String, prometheus::Error> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Constant-time comparison that does not leak input lengths.
/// Both inputs are hashed to fixed-length digests first.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use sha2::{Digest, Sha256};
    use subtle::ConstantTimeEq;
    let ha = Sha256::digest(a);
    let hb = Sha256::digest(b);
    ha.as_slice().ct_eq(hb.as_slice()).into()
}
