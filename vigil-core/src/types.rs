//! Fundamental types shared across the Vigil pipeline.
//!
//! Evaluation data model (test cases, runs, results, metrics), transcript
//! turns, and the priority/sentiment enums used by the escalation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metric weights for the composite score.
pub const FAITHFULNESS_WEIGHT: f64 = 0.3;
pub const RELEVANCY_WEIGHT: f64 = 0.3;
pub const PRECISION_WEIGHT: f64 = 0.2;
pub const RECALL_WEIGHT: f64 = 0.2;

/// A retrieved knowledge-base chunk supplied as grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    /// Chunk text.
    pub content: String,
    /// Where the chunk came from (document id, URL, KB article).
    pub source: String,
    /// Retrieval relevance score in [0,1].
    pub relevance: f64,
}

impl ContextChunk {
    pub fn new(content: impl Into<String>, source: impl Into<String>, relevance: f64) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            relevance,
        }
    }
}

/// A single authored test case. Immutable once part of a test set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TestCase {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            expected_answer: None,
            ground_truth: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }
}

/// A named, tenant-owned collection of test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSet {
    pub id: String,
    pub tenant_id: String,
    pub test_cases: Vec<TestCase>,
}

/// Per-query quality metrics, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub faithfulness: f64,
    pub answer_relevancy: f64,
    pub context_precision: f64,
    pub context_recall: f64,
    pub composite_score: f64,
}

impl EvaluationMetrics {
    /// Build a metric vector, deriving the composite from the fixed weights.
    pub fn from_components(
        faithfulness: f64,
        answer_relevancy: f64,
        context_precision: f64,
        context_recall: f64,
    ) -> Self {
        let composite_score = FAITHFULNESS_WEIGHT * faithfulness
            + RELEVANCY_WEIGHT * answer_relevancy
            + PRECISION_WEIGHT * context_precision
            + RECALL_WEIGHT * context_recall;
        Self {
            faithfulness,
            answer_relevancy,
            context_precision,
            context_recall,
            composite_score,
        }
    }

    /// Arithmetic mean of the four core metrics (composite excluded).
    ///
    /// This is the number regression classification compares across runs.
    pub fn core_mean(&self) -> f64 {
        (self.faithfulness + self.answer_relevancy + self.context_precision + self.context_recall)
            / 4.0
    }
}

/// Outcome of a single test-case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Failed,
}

/// Per-query output of an evaluation run. Persisted once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: Uuid,
    pub run_id: Uuid,
    pub query: String,
    pub retrieved_context: Vec<ContextChunk>,
    pub generated_answer: String,
    pub metrics: EvaluationMetrics,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
    pub cost_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Regression classification of a run relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionStatus {
    No,
    Warning,
    Critical,
}

/// Aggregate record of a test-set execution.
///
/// Created on submission in `Running` state and mutated only by the owning
/// execution; terminal once `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: Uuid,
    pub tenant_id: String,
    pub test_set_id: String,
    pub evaluation_type: String,
    pub status: RunStatus,
    pub total_cases: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub averages: EvaluationMetrics,
    pub is_regression: RegressionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_run_id: Option<Uuid>,
    pub regression_threshold: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Answer text plus the token/cost metadata the generator reports.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub cost_usd: f64,
}

impl GeneratedAnswer {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Escalation priority, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Coarse user sentiment as detected by keyword matching upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Frustrated,
}

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

/// One turn of a support conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub content: String,
}

impl TranscriptTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_score_weighting() {
        let m = EvaluationMetrics::from_components(1.0, 0.5, 0.25, 0.75);
        let expected = 0.3 * 1.0 + 0.3 * 0.5 + 0.2 * 0.25 + 0.2 * 0.75;
        assert!((m.composite_score - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn test_composite_score_bounds() {
        let zero = EvaluationMetrics::from_components(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.composite_score, 0.0);

        let one = EvaluationMetrics::from_components(1.0, 1.0, 1.0, 1.0);
        assert!((one.composite_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_core_mean() {
        let m = EvaluationMetrics::from_components(0.8, 0.6, 0.4, 0.2);
        assert!((m.core_mean() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_run_status_serde() {
        let json = serde_json::to_string(&RunStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let restored: RunStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(restored, RunStatus::Completed);
    }

    #[test]
    fn test_regression_status_serde() {
        let json = serde_json::to_string(&RegressionStatus::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let restored: RegressionStatus = serde_json::from_str("\"no\"").unwrap();
        assert_eq!(restored, RegressionStatus::No);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_test_case_builder() {
        let case = TestCase::new("what is the refund window?").with_ground_truth("30 days");
        assert_eq!(case.query, "what is the refund window?");
        assert_eq!(case.ground_truth.as_deref(), Some("30 days"));
        assert!(case.expected_answer.is_none());
    }
}
