//! Evaluation-run engine: executes curated test sets against the live
//! retrieval and generation collaborators, scores every answer, and flags
//! regressions against a baseline run.
//!
//! Execution is sequential per test case so regression numbers are
//! reproducible. A failed case is recorded and skipped over; it never aborts
//! the run. Aggregates are written once, at the end.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EvaluationError, VigilError};
use crate::scoring;
use crate::store::EvaluationStore;
use crate::types::{
    ContextChunk, EvaluationMetrics, EvaluationResult, EvaluationRun, GeneratedAnswer,
    RegressionStatus, ResultStatus, RunStatus, TestCase, TestSet,
};

/// Default degradation threshold for regression classification.
pub const DEFAULT_REGRESSION_THRESHOLD: f64 = 0.05;

/// Retrieval collaborator. External, treated as a black box.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve(&self, tenant_id: &str, query: &str) -> Result<Vec<ContextChunk>, String>;
}

/// Generation collaborator. External, treated as a black box returning text
/// plus token/cost metadata.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        context: &[ContextChunk],
    ) -> Result<GeneratedAnswer, String>;
}

/// What a run should execute: a stored test set or inline cases.
#[derive(Debug, Clone)]
pub enum RunSource {
    TestSet(String),
    Inline(Vec<TestCase>),
}

/// Classify a degradation against the configured threshold.
pub fn classify_regression(degradation: f64, threshold: f64) -> RegressionStatus {
    if degradation > 2.0 * threshold {
        RegressionStatus::Critical
    } else if degradation > threshold {
        RegressionStatus::Warning
    } else {
        RegressionStatus::No
    }
}

/// Orchestrates test-set execution against the collaborator seams.
pub struct EvaluationEngine {
    store: Arc<dyn EvaluationStore>,
    retriever: Arc<dyn ContextRetriever>,
    generator: Arc<dyn AnswerGenerator>,
}

impl EvaluationEngine {
    pub fn new(
        store: Arc<dyn EvaluationStore>,
        retriever: Arc<dyn ContextRetriever>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            store,
            retriever,
            generator,
        }
    }

    /// Create a run for a tenant and persist it in `Running` state.
    ///
    /// Inline cases are stored as an ephemeral test set keyed by the run id,
    /// so execution always reads cases through the store.
    pub fn create_run(
        &self,
        tenant_id: &str,
        source: RunSource,
        evaluation_type: &str,
        baseline_run_id: Option<Uuid>,
        regression_threshold: Option<f64>,
    ) -> Result<Uuid, VigilError> {
        let run_id = Uuid::new_v4();

        let test_set_id = match source {
            RunSource::TestSet(id) => {
                if self.store.test_set(tenant_id, &id).is_none() {
                    return Err(EvaluationError::not_found("test set", &id).into());
                }
                id
            }
            RunSource::Inline(cases) => {
                if cases.is_empty() {
                    return Err(EvaluationError::Validation {
                        message: "either a test set id or inline test cases must be provided"
                            .into(),
                    }
                    .into());
                }
                let id = format!("inline-{run_id}");
                self.store.insert_test_set(TestSet {
                    id: id.clone(),
                    tenant_id: tenant_id.to_string(),
                    test_cases: cases,
                });
                id
            }
        };

        let run = EvaluationRun {
            id: run_id,
            tenant_id: tenant_id.to_string(),
            test_set_id,
            evaluation_type: evaluation_type.to_string(),
            status: RunStatus::Running,
            total_cases: 0,
            succeeded: 0,
            failed: 0,
            averages: EvaluationMetrics::default(),
            is_regression: RegressionStatus::No,
            baseline_run_id,
            regression_threshold: regression_threshold.unwrap_or(DEFAULT_REGRESSION_THRESHOLD),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
        };
        self.store.insert_run(run);
        info!(%run_id, tenant_id, "evaluation run created");
        Ok(run_id)
    }

    /// Execute a run to completion.
    ///
    /// The `Running`-state guard doubles as the single-execution lock: a
    /// completed run cannot be executed again, and there is never more than
    /// one owning execution per run id.
    pub async fn execute_run(&self, run_id: Uuid) -> Result<EvaluationRun, VigilError> {
        let mut run = self
            .store
            .run(run_id)
            .ok_or_else(|| EvaluationError::not_found("run", run_id.to_string()))?;

        if run.status != RunStatus::Running {
            return Err(EvaluationError::InvalidState {
                run_id: run_id.to_string(),
                expected: RunStatus::Running.to_string(),
                actual: run.status.to_string(),
            }
            .into());
        }

        // Resolve the baseline before doing any work so a bad reference
        // fails the run submission, not the aggregate step.
        let baseline = match run.baseline_run_id {
            Some(baseline_id) => Some(
                self.store
                    .run(baseline_id)
                    .ok_or_else(|| {
                        EvaluationError::not_found("baseline run", baseline_id.to_string())
                    })?,
            ),
            None => None,
        };

        let test_set = self
            .store
            .test_set(&run.tenant_id, &run.test_set_id)
            .ok_or_else(|| EvaluationError::not_found("test set", &run.test_set_id))?;

        let wall_clock = Instant::now();
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut metric_sums = [0.0f64; 4];

        for case in &test_set.test_cases {
            let result = self.execute_case(&run, case).await;
            match result.status {
                ResultStatus::Success => {
                    succeeded += 1;
                    metric_sums[0] += result.metrics.faithfulness;
                    metric_sums[1] += result.metrics.answer_relevancy;
                    metric_sums[2] += result.metrics.context_precision;
                    metric_sums[3] += result.metrics.context_recall;
                }
                ResultStatus::Failed => failed += 1,
            }
            self.store.insert_result(result);
        }

        let averages = if succeeded == 0 {
            EvaluationMetrics::default()
        } else {
            let n = succeeded as f64;
            EvaluationMetrics::from_components(
                metric_sums[0] / n,
                metric_sums[1] / n,
                metric_sums[2] / n,
                metric_sums[3] / n,
            )
        };

        let is_regression = match &baseline {
            Some(baseline_run) => {
                let degradation = baseline_run.averages.core_mean() - averages.core_mean();
                let classification = classify_regression(degradation, run.regression_threshold);
                debug!(
                    %run_id,
                    degradation,
                    threshold = run.regression_threshold,
                    ?classification,
                    "regression check"
                );
                classification
            }
            None => RegressionStatus::No,
        };

        run.total_cases = test_set.test_cases.len();
        run.succeeded = succeeded;
        run.failed = failed;
        run.averages = averages;
        run.is_regression = is_regression;
        run.status = RunStatus::Completed;
        run.completed_at = Some(Utc::now());
        run.duration_ms = Some(wall_clock.elapsed().as_millis() as u64);
        self.store.update_run(run.clone());

        info!(
            %run_id,
            total = run.total_cases,
            succeeded,
            failed,
            composite = run.averages.composite_score,
            "evaluation run completed"
        );
        Ok(run)
    }

    /// Run one test case, converting any collaborator failure into a
    /// recorded per-case failure.
    async fn execute_case(&self, run: &EvaluationRun, case: &TestCase) -> EvaluationResult {
        let started = Instant::now();

        let outcome = self.retrieve_and_generate(&run.tenant_id, case).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok((context, answer)) => {
                let metrics = scoring::score(
                    &case.query,
                    &context,
                    &answer.text,
                    case.ground_truth.as_deref(),
                );
                EvaluationResult {
                    id: Uuid::new_v4(),
                    run_id: run.id,
                    query: case.query.clone(),
                    retrieved_context: context,
                    generated_answer: answer.text,
                    metrics,
                    status: ResultStatus::Success,
                    error: None,
                    latency_ms,
                    cost_usd: answer.cost_usd,
                    created_at: Utc::now(),
                }
            }
            Err(message) => {
                warn!(run_id = %run.id, query = %case.query, error = %message, "test case failed");
                EvaluationResult {
                    id: Uuid::new_v4(),
                    run_id: run.id,
                    query: case.query.clone(),
                    retrieved_context: vec![],
                    generated_answer: String::new(),
                    metrics: EvaluationMetrics::default(),
                    status: ResultStatus::Failed,
                    error: Some(message),
                    latency_ms,
                    cost_usd: 0.0,
                    created_at: Utc::now(),
                }
            }
        }
    }

    async fn retrieve_and_generate(
        &self,
        tenant_id: &str,
        case: &TestCase,
    ) -> Result<(Vec<ContextChunk>, GeneratedAnswer), String> {
        let context = self
            .retriever
            .retrieve(tenant_id, &case.query)
            .await
            .map_err(|e| format!("retrieval failed: {e}"))?;
        let answer = self
            .generator
            .generate(&case.query, &context)
            .await
            .map_err(|e| format!("generation failed: {e}"))?;
        Ok((context, answer))
    }
}
