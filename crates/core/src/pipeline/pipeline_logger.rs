use std::collections::BTreeMap;
use std::time::Instant;

/// Observer for the frame loop: progress, per-stage timings and per-frame
/// metrics.
///
/// Keeps the loop free of any particular output mechanism.
pub trait PipelineLogger: Send {
    /// `total` is 0 when the source length is unknown.
    fn progress(&mut self, current: usize, total: usize);

    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Point-in-time value such as `anchor_interval` or `max_heat`.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    fn summary(&self) {}
}

/// Discards everything. Used by tests and library callers with their own
/// reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Default)]
struct Series {
    count: usize,
    sum: f64,
    max: f64,
}

impl Series {
    fn push(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Logs progress through `log` every `throttle_frames` frames and keeps
/// running statistics for an end-of-run summary.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: BTreeMap<String, Series>,
    metrics: BTreeMap<String, Series>,
    start_time: Instant,
    frames: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: BTreeMap::new(),
            metrics: BTreeMap::new(),
            start_time: Instant::now(),
            frames: 0,
        }
    }

    /// `None` until something has been recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Tracking summary ({} frames, {elapsed:.1}s):",
            self.frames
        )];

        for (stage, s) in &self.timings {
            lines.push(format!(
                "  {stage:12}: avg {:6.2}ms  max {:7.2}ms",
                s.mean(),
                s.max
            ));
        }
        for (name, s) in &self.metrics {
            lines.push(format!("  {name}: avg {:.2}  max {:.2}", s.mean(), s.max));
        }
        if self.frames > 0 && elapsed > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames as f64 / elapsed
            ));
        }
        Some(lines.join("\n"))
    }

    pub fn mean_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Series::mean)
    }

    pub fn mean_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Series::mean)
    }

    pub fn max_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(|s| s.max)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames = current;
        let due = current % self.throttle_frames == 0 || (total > 0 && current == total);
        if !due {
            return;
        }
        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Tracked {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Tracked {current} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
