// Metric names and label sets are fixed at compile time.
#![allow(clippy::expect_used)]

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry};
use std::path::Path;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Snapshot Metrics ====
    pub static ref SNAPSHOTS_TOTAL: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("timelapser_snapshots_total", "Total number of snapshot attempts"),
            &["camera", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SNAPSHOT_BYTES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("timelapser_snapshot_bytes_total", "Total snapshot bytes written"),
            &["camera"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SNAPSHOT_FETCH_DURATION: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "timelapser_snapshot_fetch_seconds",
                "Duration of snapshot HTTP fetches",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["camera"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Timelapse Metrics ====
    pub static ref TIMELAPSES_TOTAL: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("timelapser_timelapses_total", "Total number of timelapse runs"),
            &["camera", "status"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref TIMELAPSE_FRAMES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("timelapser_timelapse_frames_total", "Total frames assembled into timelapses"),
            &["camera"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref ENCODER_DURATION: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "timelapser_encoder_seconds",
                "Wall time of encoder process invocations",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
            &["camera"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Scheduler Metrics ====
    pub static ref SCHEDULED_JOBS: IntGauge = {
        let metric = IntGauge::new("timelapser_scheduled_jobs", "Number of registered recurring jobs")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref SKIPPED_TICKS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "timelapser_skipped_ticks_total",
                "Ticks skipped because the previous run of the same job was still in flight",
            ),
            &["camera", "job"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Encode all registered metrics in the Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}

/// Write the current metrics to `path` for a textfile collector.
///
/// The file is written next to its final location and renamed into place so
/// collectors never read a partial file.
pub fn write_textfile(path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let encoded = encode_metrics().context("failed to encode metrics")?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, encoded)
        .with_context(|| format!("failed to write metrics file {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move metrics file into {}", path.display()))?;
    Ok(())
}
