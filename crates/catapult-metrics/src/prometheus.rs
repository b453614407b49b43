//! Prometheus text exposition format.
//!
//! Renders a `MetricsSnapshot` into the Prometheus text exposition format
//! for scraping by a Prometheus server or compatible agent.

use std::fmt::Write as _;

use crate::registry::{HistogramSample, MetricsSnapshot, Sample};

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render a snapshot into Prometheus text format.
///
/// Every family gets `# HELP` and `# TYPE` lines even when it has no
/// samples yet.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();

    write_family(
        &mut out,
        "http_requests_total",
        "Total number of HTTP requests",
        "counter",
        &snapshot.requests_total,
    );
    write_histogram(
        &mut out,
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &snapshot.request_duration,
    );
    write_family(
        &mut out,
        "http_requests_in_progress",
        "Number of HTTP requests currently in progress",
        "gauge",
        &snapshot.requests_in_progress,
    );
    write_family(
        &mut out,
        "custom_operations_total",
        "Total number of custom operations",
        "counter",
        &snapshot.custom_operations_total,
    );
    write_family(
        &mut out,
        "custom_value",
        "A custom gauge value",
        "gauge",
        &snapshot.custom_value,
    );
    write_scalar(
        &mut out,
        "catapult_event_loop_runs_total",
        "Total number of event loop state checks",
        "counter",
        snapshot.event_loop_runs_total as f64,
    );
    write_scalar(
        &mut out,
        "catapult_event_loop_errors_total",
        "Total number of failed event loop state checks",
        "counter",
        snapshot.event_loop_errors_total as f64,
    );
    write_family(
        &mut out,
        "catapult_readiness_checks_total",
        "Readiness checks per service and result",
        "counter",
        &snapshot.readiness_checks_total,
    );
    write_family(
        &mut out,
        "catapult_service_check_latency_seconds",
        "Latency of the most recent readiness check per service",
        "gauge",
        &snapshot.service_check_latency,
    );

    out
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn write_family(out: &mut String, name: &str, help: &str, kind: &str, samples: &[Sample]) {
    write_header(out, name, help, kind);
    for s in samples {
        let _ = writeln!(out, "{name}{} {}", format_labels(&s.labels, None), format_value(s.value));
    }
}

fn write_scalar(out: &mut String, name: &str, help: &str, kind: &str, value: f64) {
    write_header(out, name, help, kind);
    let _ = writeln!(out, "{name} {}", format_value(value));
}

fn write_histogram(out: &mut String, name: &str, help: &str, samples: &[HistogramSample]) {
    write_header(out, name, help, "histogram");
    for s in samples {
        for (bound, count) in &s.buckets {
            let le = format_value(*bound);
            let _ = writeln!(out, "{name}_bucket{} {count}", format_labels(&s.labels, Some(&le)));
        }
        let _ = writeln!(
            out,
            "{name}_bucket{} {}",
            format_labels(&s.labels, Some("+Inf")),
            s.count
        );
        let _ = writeln!(out, "{name}_sum{} {}", format_labels(&s.labels, None), format_value(s.sum));
        let _ = writeln!(out, "{name}_count{} {}", format_labels(&s.labels, None), s.count);
    }
}

fn format_labels(labels: &[(&'static str, String)], le: Option<&str>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{le}\""));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(","))
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
