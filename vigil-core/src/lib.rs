//! # Vigil Core
//!
//! Answer quality gate and human-escalation handoff pipeline for an AI
//! customer-support platform. Provides the metric scorers, the evaluation
//! run engine, the grounding/hallucination checker, the escalation trigger
//! engine, and the bidirectional support-desk handoff protocol (outbound
//! REST, inbound signed webhooks).

pub mod config;
pub mod error;
pub mod escalation;
pub mod evaluation;
pub mod gate;
pub mod grounding;
pub mod handoff;
pub mod scoring;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{EvaluationConfig, SupportDeskConfig, VigilConfig};
pub use error::{ConfigError, EvaluationError, HandoffError, Result, VigilError};
pub use escalation::{
    detect_trigger, evaluate_escalation_need, trigger_catalog, Complexity, EscalationDecision,
    EscalationSignals, EscalationTrigger, IssueCategory, TriggerType,
};
pub use evaluation::{
    classify_regression, AnswerGenerator, ContextRetriever, EvaluationEngine, RunSource,
    DEFAULT_REGRESSION_THRESHOLD,
};
pub use gate::{assess, GateOutcome, SessionCounters};
pub use grounding::{
    build_grounding_prompt, check_response, GroundingContext, HallucinationCheckResult,
    VerifiedClaim,
};
pub use handoff::{
    extract_agent_feedback, parse_webhook, verify_signature, AgentFeedback, EscalationContext,
    EscalationHandoff, HttpSupportDeskClient, ParsedWebhookEvent, SupportDeskApi,
};
pub use store::{EvaluationStore, JsonFileStore, MemoryStore};
pub use types::{
    ContextChunk, EvaluationMetrics, EvaluationResult, EvaluationRun, GeneratedAnswer, Priority,
    RegressionStatus, ResultStatus, RunStatus, Sentiment, Speaker, TestCase, TestSet,
    TranscriptTurn,
};
