// Operation timing and run statistics
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Configuration for the monitoring system
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub enable_performance_tracking: bool,
    pub max_completed_operations: usize,
    /// Operations faster than this are kept out of the info log
    pub min_logged_duration_ms: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_performance_tracking: true,
            max_completed_operations: 1000,
            min_logged_duration_ms: 100,
        }
    }
}

/// Status of a finished operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Completed,
    Failed,
}

/// Performance metrics for an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub operation_id: String,
    pub operation_name: String,
    pub status: OperationStatus,
    pub start_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub records_processed: Option<u64>,
    pub throughput: Option<f64>, // records per second
}

/// Summary over every recorded operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_operations: usize,
    pub successful_operations: usize,
    pub failed_operations: usize,
    pub avg_duration_ms: f64,
    pub total_records_processed: u64,
}

/// Monotonic timer held for exactly the span of one operation.
///
/// `start` acquires the clock reading, `finish` releases it and yields the
/// elapsed time, so callers can return `(result, elapsed)` directly.
#[derive(Debug)]
pub struct OperationTimer {
    operation_id: String,
    operation_name: String,
    start_time: DateTime<Utc>,
    started: Instant,
}

impl OperationTimer {
    pub fn start(operation_name: &str) -> Self {
        let operation_id = Uuid::new_v4().to_string();
        debug!(
            operation_id = %operation_id,
            operation_name = operation_name,
            "Started operation"
        );
        Self {
            operation_id,
            operation_name: operation_name.to_string(),
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the clock
    pub fn finish(self) -> Duration {
        self.started.elapsed()
    }

    /// Stop the clock and turn the measurement into a metric
    pub fn finish_with(self, status: OperationStatus, records_processed: Option<u64>) -> PerformanceMetric {
        let elapsed = self.started.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        let throughput = match records_processed {
            Some(records) if elapsed.as_secs_f64() > 0.0 => Some(records as f64 / elapsed.as_secs_f64()),
            _ => None,
        };

        PerformanceMetric {
            operation_id: self.operation_id,
            operation_name: self.operation_name,
            status,
            start_time: self.start_time,
            duration_ms,
            records_processed,
            throughput,
        }
    }
}

/// Await `future`, returning its output together with the elapsed time
pub async fn timed<F: Future>(operation_name: &str, future: F) -> (F::Output, Duration) {
    let timer = OperationTimer::start(operation_name);
    let output = future.await;
    (output, timer.finish())
}

/// Collects finished operation metrics for one analysis run
#[derive(Debug)]
pub struct MonitoringSystem {
    config: MonitoringConfig,
    completed_operations: Mutex<Vec<PerformanceMetric>>,
}

impl Default for MonitoringSystem {
    fn default() -> Self {
        Self::new(MonitoringConfig::default())
    }
}

impl MonitoringSystem {
    pub fn new(config: MonitoringConfig) -> Self {
        debug!("Initializing monitoring system with config: {:?}", config);
        Self {
            config,
            completed_operations: Mutex::new(Vec::new()),
        }
    }

    /// Store a finished operation, dropping the oldest once the limit is reached
    pub fn record(&self, metric: PerformanceMetric) {
        if metric.duration_ms >= self.config.min_logged_duration_ms as f64 {
            match metric.status {
                OperationStatus::Completed => info!(
                    operation_id = %metric.operation_id,
                    operation_name = %metric.operation_name,
                    duration_ms = metric.duration_ms,
                    "Operation completed"
                ),
                OperationStatus::Failed => warn!(
                    operation_id = %metric.operation_id,
                    operation_name = %metric.operation_name,
                    duration_ms = metric.duration_ms,
                    "Operation failed"
                ),
            }
        }

        if !self.config.enable_performance_tracking {
            return;
        }

        if let Ok(mut completed) = self.completed_operations.lock() {
            completed.push(metric);
            if completed.len() > self.config.max_completed_operations {
                completed.remove(0);
            }
        }
    }

    pub fn completed_operations(&self) -> Vec<PerformanceMetric> {
        self.completed_operations
            .lock()
            .map(|completed| completed.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> SystemStats {
        let completed = self.completed_operations();
        if completed.is_empty() {
            return SystemStats::default();
        }

        let successful_operations = completed
            .iter()
            .filter(|m| m.status == OperationStatus::Completed)
            .count();
        let total_duration: f64 = completed.iter().map(|m| m.duration_ms).sum();

        SystemStats {
            total_operations: completed.len(),
            successful_operations,
            failed_operations: completed.len() - successful_operations,
            avg_duration_ms: total_duration / completed.len() as f64,
            total_records_processed: completed.iter().filter_map(|m| m.records_processed).sum(),
        }
    }
}
