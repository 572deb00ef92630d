use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use dashmap::DashMap;
use relcheck_core::engine::{Decision, FailClosed};

#[derive(Debug, Default)]
struct MethodStats {
    count: AtomicU64,
    latency_micros: AtomicU64,
}

#[derive(Debug, Default)]
pub struct Metrics {
    request_total: AtomicU64,
    request_success: AtomicU64,
    request_error: AtomicU64,
    decisions_allowed: AtomicU64,
    decisions_denied: AtomicU64,
    fail_closed_depth: AtomicU64,
    fail_closed_cycle: AtomicU64,
    fail_closed_timeout: AtomicU64,
    model_cache_hits: AtomicU64,
    model_cache_misses: AtomicU64,
    decision_cache_hits: AtomicU64,
    decision_cache_misses: AtomicU64,
    methods: DashMap<&'static str, MethodStats>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.request_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.request_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_total(&self) -> u64 {
        self.request_total.load(Ordering::Relaxed)
    }

    pub fn request_success(&self) -> u64 {
        self.request_success.load(Ordering::Relaxed)
    }

    pub fn request_error(&self) -> u64 {
        self.request_error.load(Ordering::Relaxed)
    }

    pub fn record_method_request(&self, method: &'static str, elapsed: Duration) {
        let stats = self.methods.entry(method).or_default();
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats.latency_micros.fetch_add(
            u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    pub fn method_count(&self, method: &str) -> u64 {
        self.methods
            .get(method)
            .map(|s| s.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn record_decision(&self, decision: &Decision) {
        if decision.allowed {
            self.decisions_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.decisions_denied.fetch_add(1, Ordering::Relaxed);
        }
        match decision.fail_closed {
            Some(FailClosed::DepthExceeded) => {
                self.fail_closed_depth.fetch_add(1, Ordering::Relaxed);
            }
            Some(FailClosed::CycleDetected) => {
                self.fail_closed_cycle.fetch_add(1, Ordering::Relaxed);
            }
            Some(FailClosed::Timeout) => {
                self.fail_closed_timeout.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }
    }

    pub fn decisions_allowed(&self) -> u64 {
        self.decisions_allowed.load(Ordering::Relaxed)
    }

    pub fn decisions_denied(&self) -> u64 {
        self.decisions_denied.load(Ordering::Relaxed)
    }

    pub fn fail_closed(&self, signal: FailClosed) -> u64 {
        match signal {
            FailClosed::DepthExceeded => self.fail_closed_depth.load(Ordering::Relaxed),
            FailClosed::CycleDetected => self.fail_closed_cycle.load(Ordering::Relaxed),
            FailClosed::Timeout => self.fail_closed_timeout.load(Ordering::Relaxed),
        }
    }

    pub fn record_model_cache_hit(&self) {
        self.model_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_cache_miss(&self) {
        self.model_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision_cache_hit(&self) {
        self.decision_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decision_cache_miss(&self) {
        self.decision_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn model_cache_hits(&self) -> u64 {
        self.model_cache_hits.load(Ordering::Relaxed)
    }

    pub fn model_cache_misses(&self) -> u64 {
        self.model_cache_misses.load(Ordering::Relaxed)
    }

    pub fn decision_cache_hits(&self) -> u64 {
        self.decision_cache_hits.load(Ordering::Relaxed)
    }

    pub fn decision_cache_misses(&self) -> u64 {
        self.decision_cache_misses.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let mut output = String::new();
        counter(
            &mut output,
            "relcheck_requests_total",
            "Total number of requests.",
            self.request_total(),
        );
        counter(
            &mut output,
            "relcheck_requests_success_total",
            "Total successful requests.",
            self.request_success(),
        );
        counter(
            &mut output,
            "relcheck_requests_error_total",
            "Total failed requests.",
            self.request_error(),
        );
        counter(
            &mut output,
            "relcheck_decisions_allowed_total",
            "Checks that allowed access.",
            self.decisions_allowed(),
        );
        counter(
            &mut output,
            "relcheck_decisions_denied_total",
            "Checks that denied access.",
            self.decisions_denied(),
        );

        output.push_str("# HELP relcheck_fail_closed_total Checks denied by an evaluation-safety signal.\n");
        output.push_str("# TYPE relcheck_fail_closed_total counter\n");
        for signal in [
            FailClosed::DepthExceeded,
            FailClosed::CycleDetected,
            FailClosed::Timeout,
        ] {
            let _ = writeln!(
                output,
                "relcheck_fail_closed_total{{signal=\"{}\"}} {}",
                signal.code(),
                self.fail_closed(signal)
            );
        }

        counter(
            &mut output,
            "relcheck_model_cache_hits_total",
            "Parsed model cache hits.",
            self.model_cache_hits(),
        );
        counter(
            &mut output,
            "relcheck_model_cache_misses_total",
            "Parsed model cache misses.",
            self.model_cache_misses(),
        );
        counter(
            &mut output,
            "relcheck_decision_cache_hits_total",
            "Decision cache hits.",
            self.decision_cache_hits(),
        );
        counter(
            &mut output,
            "relcheck_decision_cache_misses_total",
            "Decision cache misses.",
            self.decision_cache_misses(),
        );

        let methods: BTreeMap<&'static str, (u64, u64)> = self
            .methods
            .iter()
            .map(|entry| {
                (
                    *entry.key(),
                    (
                        entry.count.load(Ordering::Relaxed),
                        entry.latency_micros.load(Ordering::Relaxed),
                    ),
                )
            })
            .collect();
        if !methods.is_empty() {
            output.push_str("# HELP relcheck_method_requests_total Requests per API method.\n");
            output.push_str("# TYPE relcheck_method_requests_total counter\n");
            for (method, (count, _)) in &methods {
                let _ = writeln!(
                    output,
                    "relcheck_method_requests_total{{method=\"{method}\"}} {count}"
                );
            }
            output.push_str(
                "# HELP relcheck_method_latency_seconds_sum Total handling time per API method.\n",
            );
            output.push_str("# TYPE relcheck_method_latency_seconds_sum counter\n");
            for (method, (_, micros)) in &methods {
                let _ = writeln!(
                    output,
                    "relcheck_method_latency_seconds_sum{{method=\"{method}\"}} {:.6}",
                    *micros as f64 / 1_000_000.0
                );
            }
        }
        output
    }
}

fn counter(output: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} counter");
    let _ = writeln!(output, "{name} {value}");
}

pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_are_zero() {
        let m = Metrics::new();
        assert_eq!(m.request_total(), 0);
        assert_eq!(m.request_success(), 0);
        assert_eq!(m.request_error(), 0);
        assert_eq!(m.decisions_allowed(), 0);
        assert_eq!(m.model_cache_hits(), 0);
        assert_eq!(m.decision_cache_misses(), 0);
    }

    #[test]
    fn record_increments_counters() {
        let m = Metrics::new();
        m.record_request();
        m.record_request();
        m.record_success();
        m.record_error();

        assert_eq!(m.request_total(), 2);
        assert_eq!(m.request_success(), 1);
        assert_eq!(m.request_error(), 1);
    }

    #[test]
    fn decisions_split_by_outcome_and_signal() {
        let m = Metrics::new();
        m.record_decision(&Decision::allow(vec!["doc:1#viewer".into()]));
        m.record_decision(&Decision::deny());
        m.record_decision(&Decision::halted(FailClosed::CycleDetected));

        assert_eq!(m.decisions_allowed(), 1);
        assert_eq!(m.decisions_denied(), 2);
        assert_eq!(m.fail_closed(FailClosed::CycleDetected), 1);
        assert_eq!(m.fail_closed(FailClosed::Timeout), 0);
    }

    #[test]
    fn method_requests_accumulate() {
        let m = Metrics::new();
        m.record_method_request("check", Duration::from_millis(2));
        m.record_method_request("check", Duration::from_millis(3));
        m.record_method_request("write", Duration::from_millis(1));

        assert_eq!(m.method_count("check"), 2);
        assert_eq!(m.method_count("write"), 1);
        assert_eq!(m.method_count("read"), 0);

        let output = m.render_prometheus();
        assert!(output.contains("relcheck_method_requests_total{method=\"check\"} 2"));
        assert!(output.contains("relcheck_method_latency_seconds_sum{method=\"check\"} 0.005000"));
    }

    #[test]
    fn render_prometheus_format() {
        let m = Metrics::new();
        m.record_request();
        m.record_success();
        m.record_decision(&Decision::halted(FailClosed::DepthExceeded));
        m.record_model_cache_hit();
        m.record_decision_cache_miss();

        let output = m.render_prometheus();

        assert!(output.contains("# TYPE relcheck_requests_total counter"));
        assert!(output.contains("relcheck_requests_total 1"));
        assert!(output.contains("relcheck_requests_success_total 1"));
        assert!(output.contains("relcheck_requests_error_total 0"));
        assert!(output.contains("relcheck_fail_closed_total{signal=\"depth_exceeded\"} 1"));
        assert!(output.contains("relcheck_model_cache_hits_total 1"));
        assert!(
            output.contains("relcheck_decision_cache_misses_total 1"),
            "missing decision cache misses: {output}"
        );
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_prometheus_text() {
        let metrics = Arc::new(Metrics::new());
        metrics.record_request();
        metrics.record_request();
        metrics.record_success();

        let app = axum::Router::new()
            .route("/metrics", axum::routing::get(metrics_handler))
            .with_state(metrics);

        let server = axum_test::TestServer::new(app).unwrap();
        let response = server.get("/metrics").await;

        response.assert_status_ok();
        let body = response.text();
        assert!(body.contains("relcheck_requests_total 2"));
        assert!(body.contains("relcheck_requests_success_total 1"));
    }
}
