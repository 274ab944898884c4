
use crate::error::{AdvisorError, AdvisorResult};
use crate::monitoring::{timed, MonitoringSystem, OperationStatus, OperationTimer};
use crate::plan_provider::{PlanCatalog, PlanProvider};
use crate::query_analyzer::{ClauseExtractor, EvaluatorConfig, PlanEvaluator};
use crate::report::{SuggestionAggregator, SuggestionBatch};
use crate::types::{PlanRow, QueryAnalysis, QueryRecord, Report};
use futures_util::stream::{self, StreamExt};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Settings for one analysis run
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub evaluator: EvaluatorConfig,
    /// Plan fetches in flight at once
    pub workers: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            evaluator: EvaluatorConfig::default(),
            workers: 4,
        }
    }
}

/// Everything produced by one pass over a set of records
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    /// One entry per SELECT record, failed plan fetches included
    pub analyses: Vec<QueryAnalysis>,
    /// Records that were not SELECT statements
    pub skipped: usize,
    /// SELECT records whose plan could not be fetched
    pub failed: usize,
    pub report: Report,
}

impl AnalysisRun {
    pub fn summary(&self) -> String {
        format!(
            "{} queries analyzed, {} skipped, {} failed, {} suggestions",
            self.report.total_queries_analyzed, self.skipped, self.failed, self.report.total_suggestions
        )
    }
}

pub struct SlowQueryAdvisor {
    config: AdvisorConfig,
    extractor: ClauseExtractor,
    evaluator: PlanEvaluator,
    monitoring: Arc<MonitoringSystem>,
}

impl SlowQueryAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self::with_monitoring(config, Arc::new(MonitoringSystem::default()))
    }

    pub fn with_monitoring(config: AdvisorConfig, monitoring: Arc<MonitoringSystem>) -> Self {
        Self {
            evaluator: PlanEvaluator::with_config(config.evaluator.clone()),
            extractor: ClauseExtractor::new(),
            config,
            monitoring,
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Analyze every SELECT record, fetching plans from `provider` with at most
    /// `workers` requests in flight. Analyses arrive in completion order.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn run<P: PlanProvider>(&self, records: &[QueryRecord], provider: &P) -> AnalysisRun {
        let timer = OperationTimer::start("analysis_run");
        let (selects, skipped) = select_records(records);
        info!("Analyzing {} SELECT queries ({} skipped)", selects.len(), skipped);

        let mut aggregator = SuggestionAggregator::new();
        let mut analyses = Vec::with_capacity(selects.len());

        let mut fetches = stream::iter(selects)
            .map(|record| async move {
                let (plan, elapsed) = timed(
                    "explain",
                    provider.explain(record.normalized_query(), record.schema.as_deref()),
                )
                .await;
                (record, plan, elapsed)
            })
            .buffer_unordered(self.config.workers.max(1));

        // Single consumer: the only place the aggregator is mutated
        while let Some((record, plan, elapsed)) = fetches.next().await {
            let (analysis, batch) = self.analyze(record, plan, elapsed);
            if let Some(batch) = batch {
                aggregator.add_batch(batch);
            }
            analyses.push(analysis);
        }

        self.finish(timer, analyses, skipped, &aggregator)
    }

    /// Analyze against pre-captured plans on the rayon pool. Each worker folds
    /// into its own aggregator and the partial results are merged.
    #[instrument(skip_all, fields(records = records.len()))]
    pub fn run_offline(&self, records: &[QueryRecord], catalog: &PlanCatalog) -> AnalysisRun {
        let timer = OperationTimer::start("analysis_run_offline");
        let (selects, skipped) = select_records(records);
        info!("Analyzing {} SELECT queries offline ({} skipped)", selects.len(), skipped);

        let (aggregator, analyses) = selects
            .par_iter()
            .map(|record| {
                let lookup = OperationTimer::start("plan_lookup");
                let plan = catalog.lookup(record.normalized_query());
                self.analyze(record, plan, lookup.finish())
            })
            .fold(
                || (SuggestionAggregator::new(), Vec::new()),
                |(mut aggregator, mut analyses), (analysis, batch)| {
                    if let Some(batch) = batch {
                        aggregator.add_batch(batch);
                    }
                    analyses.push(analysis);
                    (aggregator, analyses)
                },
            )
            .reduce(
                || (SuggestionAggregator::new(), Vec::new()),
                |(mut left, mut left_analyses), (right, right_analyses)| {
                    left.merge(right);
                    left_analyses.extend(right_analyses);
                    (left, left_analyses)
                },
            );

        self.finish(timer, analyses, skipped, &aggregator)
    }

    /// Turn one plan fetch into an analysis and, on success, the batch to aggregate
    pub fn analyze(
        &self,
        record: &QueryRecord,
        plan: AdvisorResult<Vec<PlanRow>>,
        elapsed: Duration,
    ) -> (QueryAnalysis, Option<SuggestionBatch>) {
        let explain_duration_ms = Some(elapsed.as_secs_f64() * 1000.0);

        match plan {
            Ok(plan) => {
                let clauses = self.extractor.extract(record.normalized_query());
                let suggestions = self.evaluator.evaluate(&clauses, &plan);
                debug!(
                    suggestions = suggestions.len(),
                    plan_rows = plan.len(),
                    "Analyzed query"
                );

                let batch = SuggestionBatch::new(record.normalized_query(), record.query_time, suggestions.clone());
                let analysis = QueryAnalysis {
                    record: record.clone(),
                    plan: Some(plan),
                    suggestions,
                    error: None,
                    explain_duration_ms,
                };
                (analysis, Some(batch))
            }
            Err(e) => {
                warn!("Could not fetch plan for query: {}", e);
                let message = match e {
                    AdvisorError::QueryExecution { message } => message,
                    other => other.to_string(),
                };
                let analysis = QueryAnalysis {
                    record: record.clone(),
                    plan: None,
                    suggestions: Vec::new(),
                    error: Some(message),
                    explain_duration_ms,
                };
                (analysis, None)
            }
        }
    }

    fn finish(
        &self,
        timer: OperationTimer,
        analyses: Vec<QueryAnalysis>,
        skipped: usize,
        aggregator: &SuggestionAggregator,
    ) -> AnalysisRun {
        let failed = analyses.iter().filter(|a| !a.is_success()).count();
        let status = if failed > 0 && failed == analyses.len() {
            OperationStatus::Failed
        } else {
            OperationStatus::Completed
        };
        self.monitoring
            .record(timer.finish_with(status, Some(analyses.len() as u64)));

        let run = AnalysisRun {
            analyses,
            skipped,
            failed,
            report: aggregator.finalize(),
        };
        info!("Analysis finished: {}", run.summary());
        run
    }
}

fn select_records(records: &[QueryRecord]) -> (Vec<&QueryRecord>, usize) {
    let selects: Vec<&QueryRecord> = records.iter().filter(|r| r.is_select()).collect();
    let skipped = records.len() - selects.len();
    (selects, skipped)
}
