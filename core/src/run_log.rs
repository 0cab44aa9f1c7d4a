/// Logging and metrics for bulk translation runs
use crate::error::TranslationError;
use crate::orchestrator::{RunOutcome, RunSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Log entry for one finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLogEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: Uuid,
    pub language: String,
    pub outcome: RunOutcome,
    pub current: u32,
    pub total: u32,
    pub succeeded: u32,
    pub skipped: u32,
    pub cache_hits: u32,
}

impl From<&RunSummary> for RunLogEntry {
    fn from(summary: &RunSummary) -> Self {
        Self {
            timestamp: summary.finished_at,
            run_id: summary.run_id,
            language: summary.language.clone(),
            outcome: summary.outcome,
            current: summary.progress.current,
            total: summary.progress.total,
            succeeded: summary.succeeded,
            skipped: summary.skipped,
            cache_hits: summary.cache_hits,
        }
    }
}

/// Metrics across the runs of one controller
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_cancelled: u64,
    pub runs_without_progress: u64,
    pub items_translated: u64,
    pub cache_hits: u64,
    pub items_skipped: u64,
    pub skipped_by_code: HashMap<String, u64>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&mut self) {
        self.runs_started += 1;
    }

    pub fn record_step(&mut self, cache_hit: bool) {
        if cache_hit {
            self.cache_hits += 1;
        } else {
            self.items_translated += 1;
        }
    }

    pub fn record_skip(&mut self, error: &TranslationError) {
        self.items_skipped += 1;
        *self
            .skipped_by_code
            .entry(error.code().to_string())
            .or_insert(0) += 1;
    }

    pub fn record_finish(&mut self, outcome: RunOutcome) {
        match outcome {
            RunOutcome::Completed => self.runs_completed += 1,
            RunOutcome::Cancelled => self.runs_cancelled += 1,
            RunOutcome::NoProgress => self.runs_without_progress += 1,
        }
    }

    pub fn skip_rate(&self) -> f64 {
        let attempted = self.items_translated + self.cache_hits + self.items_skipped;
        if attempted == 0 {
            0.0
        } else {
            self.items_skipped as f64 / attempted as f64
        }
    }
}

/// Logger for bulk runs. Cloning shares the same metrics and log file.
#[derive(Clone, Default)]
pub struct RunLogger {
    inner: Arc<RunLoggerInner>,
}

#[derive(Default)]
struct RunLoggerInner {
    log_file: Mutex<Option<BufWriter<File>>>,
    metrics: Mutex<RunMetrics>,
}

impl RunLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one JSONL entry per finished run to `path`
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let logger = Self::new();
        logger.init_file_logging(path)?;
        Ok(logger)
    }

    pub fn init_file_logging<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| format!("Failed to open run log file: {}", e))?;

        if let Ok(mut guard) = self.inner.log_file.lock() {
            *guard = Some(BufWriter::new(file));
        }

        Ok(())
    }

    pub fn record_start(&self) {
        self.with_metrics(RunMetrics::record_start);
    }

    pub fn record_step(&self, cache_hit: bool) {
        self.with_metrics(|metrics| metrics.record_step(cache_hit));
    }

    pub fn record_skip(&self, error: &TranslationError) {
        self.with_metrics(|metrics| metrics.record_skip(error));
    }

    pub fn log_finished(&self, summary: &RunSummary) {
        let entry = RunLogEntry::from(summary);

        if let Ok(mut guard) = self.inner.log_file.lock() {
            if let Some(writer) = guard.as_mut() {
                if let Ok(json) = serde_json::to_string(&entry) {
                    let _ = writeln!(writer, "{}", json);
                    let _ = writer.flush();
                }
            }
        }

        self.with_metrics(|metrics| metrics.record_finish(summary.outcome));
    }

    pub fn metrics(&self) -> RunMetrics {
        self.inner
            .metrics
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn reset_metrics(&self) {
        self.with_metrics(|metrics| *metrics = RunMetrics::new());
    }

    pub fn export_metrics_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(&self.metrics())
            .map_err(|e| format!("Failed to serialize metrics: {}", e))
    }

    fn with_metrics(&self, update: impl FnOnce(&mut RunMetrics)) {
        if let Ok(mut metrics) = self.inner.metrics.lock() {
            update(&mut metrics);
        }
    }
}

/// Default run log location for the current day
pub fn default_run_log_path() -> PathBuf {
    let app_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("translation-overlay")
        .join("logs");

    std::fs::create_dir_all(&app_dir).ok();

    let timestamp = chrono::Local::now().format("%Y%m%d");
    app_dir.join(format!("runs-{}.jsonl", timestamp))
}
