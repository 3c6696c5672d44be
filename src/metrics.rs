//! 进程内计数器，以 Prometheus 文本格式导出

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::utils::duration_micros;

#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    start_time_secs: f64,
    /// (路径, 状态码) -> 请求数
    http_requests: Mutex<BTreeMap<(String, u16), u64>>,
    store_pings_ok: AtomicU64,
    store_pings_failed: AtomicU64,
    store_last_ping_micros: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let start_time_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        Self {
            started: Instant::now(),
            start_time_secs,
            http_requests: Mutex::new(BTreeMap::new()),
            store_pings_ok: AtomicU64::new(0),
            store_pings_failed: AtomicU64::new(0),
            store_last_ping_micros: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, path: &str, status: u16) {
        *self
            .http_requests
            .lock()
            .entry((path.to_string(), status))
            .or_default() += 1;
    }

    pub fn record_ping(&self, latency: Option<std::time::Duration>) {
        match latency {
            Some(latency) => {
                self.store_pings_ok.fetch_add(1, Ordering::Relaxed);
                let micros = duration_micros(latency);
                self.store_last_ping_micros.store(micros, Ordering::Relaxed);
            }
            None => {
                self.store_pings_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn requests(&self, path: &str, status: u16) -> u64 {
        self.http_requests
            .lock()
            .get(&(path.to_string(), status))
            .copied()
            .unwrap_or_default()
    }

    /// Prometheus 文本格式
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "# HELP process_start_time_seconds Start time of the process since unix epoch in seconds.");
        let _ = writeln!(out, "# TYPE process_start_time_seconds gauge");
        let _ = writeln!(out, "process_start_time_seconds {}", self.start_time_secs);

        let _ = writeln!(out, "# HELP process_uptime_seconds Seconds since the process started.");
        let _ = writeln!(out, "# TYPE process_uptime_seconds gauge");
        let _ = writeln!(out, "process_uptime_seconds {}", self.started.elapsed().as_secs_f64());

        let _ = writeln!(out, "# HELP http_requests_total HTTP requests served.");
        let _ = writeln!(out, "# TYPE http_requests_total counter");
        for ((path, status), count) in self.http_requests.lock().iter() {
            let _ = writeln!(
                out,
                "http_requests_total{{path=\"{}\",status=\"{}\"}} {}",
                escape_label(path),
                status,
                count
            );
        }

        let _ = writeln!(out, "# HELP store_pings_total Store liveness probes by outcome.");
        let _ = writeln!(out, "# TYPE store_pings_total counter");
        let _ = writeln!(
            out,
            "store_pings_total{{result=\"ok\"}} {}",
            self.store_pings_ok.load(Ordering::Relaxed)
        );
        let _ = writeln!(
            out,
            "store_pings_total{{result=\"error\"}} {}",
            self.store_pings_failed.load(Ordering::Relaxed)
        );

        let _ = writeln!(out, "# HELP store_last_ping_seconds Latency of the last successful store ping.");
        let _ = writeln!(out, "# TYPE store_last_ping_seconds gauge");
        let _ = writeln!(
            out,
            "store_last_ping_seconds {}",
            self.store_last_ping_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
        );

        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counts_requests_per_path_and_status() {
        let metrics = Metrics::new();
        metrics.record_request("/healthz", 200);
        metrics.record_request("/healthz", 200);
        metrics.record_request("/nope", 404);

        assert_eq!(metrics.requests("/healthz", 200), 2);
        assert!(metrics
            .render()
            .contains("http_requests_total{path=\"/nope\",status=\"404\"} 1"));
    }

    #[test]
    fn ping_outcomes_rendered() {
        let metrics = Metrics::new();
        metrics.record_ping(Some(Duration::from_millis(2)));
        metrics.record_ping(None);

        let text = metrics.render();
        assert!(text.contains("store_pings_total{result=\"ok\"} 1"));
        assert!(text.contains("store_pings_total{result=\"error\"} 1"));
        assert!(text.contains("store_last_ping_seconds 0.002"));
        assert!(text.contains("# TYPE process_uptime_seconds gauge"));
    }
}
