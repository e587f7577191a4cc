//! Integration test for the evaluation-run lifecycle against the file-backed
//! store: baseline run, degraded follow-up run, regression classification,
//! and per-result persistence across a store reopen.

use async_trait::async_trait;
use std::sync::Arc;

use vigil_core::{
    AnswerGenerator, ContextChunk, ContextRetriever, EvaluationEngine, EvaluationStore,
    GeneratedAnswer, JsonFileStore, RegressionStatus, RunSource, RunStatus, TestCase, TestSet,
};

struct StaticRetriever;

#[async_trait]
impl ContextRetriever for StaticRetriever {
    async fn retrieve(
        &self,
        _tenant_id: &str,
        query: &str,
    ) -> Result<Vec<ContextChunk>, String> {
        Ok(vec![ContextChunk::new(
            format!("documentation covering {query}"),
            "kb-docs",
            0.88,
        )])
    }
}

/// Well-behaved generator: repeats the query with a full citation set.
struct GoodGenerator;

#[async_trait]
impl AnswerGenerator for GoodGenerator {
    async fn generate(
        &self,
        query: &str,
        _context: &[ContextChunk],
    ) -> Result<GeneratedAnswer, String> {
        Ok(GeneratedAnswer {
            text: format!("{query} [KB:docs] [KB:docs] [KB:docs]"),
            input_tokens: 120,
            output_tokens: 40,
            cost_usd: 0.0015,
        })
    }
}

/// Degraded generator: ignores the query and cites nothing.
struct DegradedGenerator;

#[async_trait]
impl AnswerGenerator for DegradedGenerator {
    async fn generate(
        &self,
        _query: &str,
        _context: &[ContextChunk],
    ) -> Result<GeneratedAnswer, String> {
        Ok(GeneratedAnswer::text_only("Something went wrong upstream."))
    }
}

fn smoke_test_set() -> TestSet {
    TestSet {
        id: "smoke".into(),
        tenant_id: "acme".into(),
        test_cases: vec![
            TestCase::new("password reset flow"),
            TestCase::new("billing cycle dates"),
        ],
    }
}

#[tokio::test]
async fn test_baseline_then_degraded_run_flags_critical_regression() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let store_path = dir.path().join("evals.json");

    let store: Arc<JsonFileStore> = Arc::new(JsonFileStore::open(&store_path)?);
    store.insert_test_set(smoke_test_set());

    // Baseline run with the healthy generator.
    let baseline_engine = EvaluationEngine::new(
        store.clone(),
        Arc::new(StaticRetriever),
        Arc::new(GoodGenerator),
    );
    let baseline_id = baseline_engine
        .create_run(
            "acme",
            RunSource::TestSet("smoke".into()),
            "rag_quality",
            None,
            None,
        )
        .unwrap();
    let baseline = baseline_engine.execute_run(baseline_id).await.unwrap();
    assert_eq!(baseline.status, RunStatus::Completed);
    assert_eq!(baseline.is_regression, RegressionStatus::No);
    assert!(baseline.averages.composite_score > 0.9);

    // Follow-up run with the degraded generator, compared to the baseline.
    let degraded_engine = EvaluationEngine::new(
        store.clone(),
        Arc::new(StaticRetriever),
        Arc::new(DegradedGenerator),
    );
    let run_id = degraded_engine
        .create_run(
            "acme",
            RunSource::TestSet("smoke".into()),
            "rag_quality",
            Some(baseline_id),
            None,
        )
        .unwrap();
    let run = degraded_engine.execute_run(run_id).await.unwrap();
    assert_eq!(run.is_regression, RegressionStatus::Critical);
    assert!(run.averages.composite_score < baseline.averages.composite_score);

    // Every case produced exactly one persisted result per run.
    assert_eq!(store.results_for_run(baseline_id).len(), 2);
    assert_eq!(store.results_for_run(run_id).len(), 2);

    // The snapshot survives a reopen with the aggregates intact.
    drop(store);
    let reopened = JsonFileStore::open(&store_path)?;
    let persisted = reopened.run(run_id).expect("run persisted");
    assert_eq!(persisted.status, RunStatus::Completed);
    assert_eq!(persisted.is_regression, RegressionStatus::Critical);
    assert_eq!(persisted.baseline_run_id, Some(baseline_id));
    assert_eq!(reopened.results_for_run(baseline_id).len(), 2);
    Ok(())
}
