//! Observability: per-run request IDs and latency histograms for every
//! pipeline stage. Histograms keep a fixed window and report p50/p95/p99.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Identifiers attached to one pipeline run.
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub trace_id: String,
    pub flow: &'static str,
}

impl RequestIds {
    pub fn new(flow: &'static str) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            flow,
        }
    }
}

/// Measures elapsed time from creation until `finish`.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// Record elapsed microseconds and return them.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity window of samples; the oldest sample is overwritten.
struct SampleWindow {
    samples: Vec<f64>,
    next: usize,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            next: 0,
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            self.samples[self.next] = value;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((p / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

/// Named latency histograms.
pub struct MetricsRegistry {
    windows: Mutex<HashMap<&'static str, SampleWindow>>,
    window_capacity: usize,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_window(256)
    }

    pub fn with_window(window_capacity: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_capacity: window_capacity.max(1),
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &'static str, value_us: f64) {
        self.windows
            .lock()
            .entry(name)
            .or_insert_with(|| SampleWindow::new(self.window_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Number of samples currently held for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.windows.lock().get(name).map_or(0, SampleWindow::len)
    }

    /// p50/p95/p99 of every metric.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.windows
            .lock()
            .iter()
            .map(|(&name, window)| {
                (
                    name.to_string(),
                    MetricSummary {
                        p50_us: window.percentile(50.0),
                        p95_us: window.percentile(95.0),
                        p99_us: window.percentile(99.0),
                        count: window.len(),
                    },
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

/// Well-known metric names.
pub mod metric_names {
    pub const POLL: &str = "t_poll";
    pub const SPEECH_CAPTURE: &str = "t_speech_capture";
    pub const CONSENT: &str = "t_consent";
    pub const SCREEN_CAPTURE: &str = "t_screen_capture";
    pub const INFERENCE: &str = "t_inference";
    pub const SYNTHESIS: &str = "t_synthesis";
    pub const WAKE_FLOW: &str = "t_wake_flow";
    pub const CONSENT_FLOW: &str = "t_consent_flow";
}
