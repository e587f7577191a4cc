//! The quality gate: joins the grounding audit and trigger detection into a
//! single escalation decision for one inbound message.
//!
//! Trigger-derived business rules take precedence; an ungrounded,
//! low-confidence answer escalates on its own even when no trigger fires.

use serde::{Deserialize, Serialize};

use crate::escalation::{
    detect_trigger, evaluate_escalation_need, EscalationDecision, EscalationSignals,
    EscalationTrigger, IssueCategory, TriggerType,
};
use crate::grounding::{check_response, HallucinationCheckResult};
use crate::types::{ContextChunk, Priority, Sentiment};

/// Confidence below which an ungrounded answer escalates by itself.
pub const LOW_CONFIDENCE_FLOOR: f64 = 0.5;

/// Everything the gate saw for one message.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub check: HallucinationCheckResult,
    pub trigger: Option<&'static EscalationTrigger>,
    pub decision: EscalationDecision,
}

/// Session counters the gate folds into the decision.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SessionCounters {
    pub failed_attempts: u32,
    pub session_duration_minutes: u32,
}

fn category_for(trigger_type: TriggerType) -> Option<IssueCategory> {
    match trigger_type {
        TriggerType::Security => Some(IssueCategory::SecurityIncident),
        TriggerType::Billing => Some(IssueCategory::Billing),
        TriggerType::Legal => Some(IssueCategory::Legal),
        TriggerType::TechnicalAccess => Some(IssueCategory::Technical),
        _ => None,
    }
}

/// Audit the generated answer and decide whether this turn goes to a human.
pub fn assess(
    user_message: &str,
    generated_answer: &str,
    context: &[ContextChunk],
    counters: SessionCounters,
) -> GateOutcome {
    let check = check_response(generated_answer, context);
    let trigger = detect_trigger(user_message, counters.failed_attempts);

    let signals = EscalationSignals {
        attempts: counters.failed_attempts,
        session_duration_minutes: counters.session_duration_minutes,
        sentiment: trigger
            .filter(|t| t.trigger_type == TriggerType::Frustration)
            .map(|_| Sentiment::Frustrated),
        complexity: None,
        explicit_request: trigger
            .is_some_and(|t| t.trigger_type == TriggerType::ExplicitRequest),
        issue_category: trigger.and_then(|t| category_for(t.trigger_type)),
    };

    let mut decision = evaluate_escalation_need(&signals);

    if !decision.should_escalate && !check.is_grounded && check.confidence < LOW_CONFIDENCE_FLOOR {
        decision = EscalationDecision {
            should_escalate: true,
            reason: "answer is not grounded in the retrieved context".to_string(),
            priority: Priority::Medium,
            recommended_specialist: None,
        };
    }

    GateOutcome {
        check,
        trigger,
        decision,
    }
}
