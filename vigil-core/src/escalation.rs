//! Rule-based escalation trigger detection and the escalation decision.
//!
//! Keyword matching here is intentionally simplistic string search. The
//! lists and thresholds are part of the product's observable behavior;
//! swapping them for a classifier is a separately scoped change.

use serde::{Deserialize, Serialize};

use crate::types::{Priority, Sentiment};

/// Category of a matched escalation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ExplicitRequest,
    Frustration,
    Security,
    Billing,
    Legal,
    FailedAttempts,
    TechnicalAccess,
}

/// A static catalog entry describing one trigger category.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationTrigger {
    pub trigger_type: TriggerType,
    pub condition: &'static str,
    pub action: &'static str,
    pub priority: Priority,
}

/// Detection order encodes business priority. First match wins; do not
/// reorder.
static TRIGGER_CATALOG: &[EscalationTrigger] = &[
    EscalationTrigger {
        trigger_type: TriggerType::ExplicitRequest,
        condition: "user explicitly asks for a human",
        action: "hand off immediately",
        priority: Priority::High,
    },
    EscalationTrigger {
        trigger_type: TriggerType::Frustration,
        condition: "repeated negative language, shouting, or exclamation",
        action: "hand off with an apology",
        priority: Priority::High,
    },
    EscalationTrigger {
        trigger_type: TriggerType::Security,
        condition: "possible account compromise or fraud",
        action: "hand off to the security queue",
        priority: Priority::Urgent,
    },
    EscalationTrigger {
        trigger_type: TriggerType::Billing,
        condition: "billing dispute or refund request",
        action: "hand off to the billing queue",
        priority: Priority::High,
    },
    EscalationTrigger {
        trigger_type: TriggerType::Legal,
        condition: "legal threat or data-protection request",
        action: "hand off to the legal queue",
        priority: Priority::High,
    },
    EscalationTrigger {
        trigger_type: TriggerType::FailedAttempts,
        condition: "assistant failed to resolve twice or more",
        action: "hand off with conversation summary",
        priority: Priority::Medium,
    },
    EscalationTrigger {
        trigger_type: TriggerType::TechnicalAccess,
        condition: "credential or account-access problem",
        action: "hand off to technical support",
        priority: Priority::Medium,
    },
];

const EXPLICIT_REQUEST_KEYWORDS: &[&str] = &[
    "speak to a human",
    "talk to a human",
    "speak to a manager",
    "talk to a manager",
    "speak with a manager",
    "human agent",
    "real person",
    "live agent",
    "customer service representative",
    "talk to someone",
    "speak to someone",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "ridiculous",
    "terrible",
    "awful",
    "worst",
    "horrible",
    "useless",
    "pathetic",
    "unacceptable",
    "garbage",
    "waste of time",
    "frustrated",
    "angry",
];

const SECURITY_KEYWORDS: &[&str] = &[
    "hacked",
    "breach",
    "unauthorized",
    "compromised",
    "stolen",
    "fraud",
    "phishing",
    "suspicious activity",
];

const BILLING_KEYWORDS: &[&str] = &[
    "refund",
    "overcharged",
    "double charged",
    "charged twice",
    "billing error",
    "wrong charge",
    "invoice",
    "cancel my subscription",
];

const LEGAL_KEYWORDS: &[&str] = &[
    "lawyer",
    "attorney",
    "legal action",
    "lawsuit",
    "sue you",
    "gdpr",
    "data protection",
];

const TECHNICAL_ACCESS_KEYWORDS: &[&str] = &[
    "api key",
    "api token",
    "password reset",
    "can't log in",
    "cannot log in",
    "can't access",
    "cannot access",
    "locked out",
    "2fa",
    "two-factor",
];

/// Failed attempts at or above which the counter trigger fires.
const FAILED_ATTEMPTS_TRIGGER: u32 = 2;

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

fn count_matches(haystack: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| haystack.contains(*k)).count()
}

/// Count all-caps words of three or more letters (shouting).
fn count_caps_words(message: &str) -> usize {
    message
        .split_whitespace()
        .filter(|word| {
            let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
            letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
        })
        .count()
}

fn is_frustrated(message: &str, lower: &str) -> bool {
    count_matches(lower, NEGATIVE_KEYWORDS) >= 2
        || count_caps_words(message) >= 2
        || message.matches('!').count() >= 3
}

fn catalog_entry(trigger_type: TriggerType) -> &'static EscalationTrigger {
    TRIGGER_CATALOG
        .iter()
        .find(|t| t.trigger_type == trigger_type)
        .expect("catalog covers every trigger type")
}

/// The full, ordered trigger catalog.
pub fn trigger_catalog() -> &'static [EscalationTrigger] {
    TRIGGER_CATALOG
}

/// Match an inbound user message against the trigger catalog.
///
/// Categories are checked in catalog order and the first match wins,
/// independent of the priority values attached to the entries.
pub fn detect_trigger(message: &str, failed_attempts: u32) -> Option<&'static EscalationTrigger> {
    let lower = message.to_lowercase();

    if contains_any(&lower, EXPLICIT_REQUEST_KEYWORDS) {
        return Some(catalog_entry(TriggerType::ExplicitRequest));
    }
    if is_frustrated(message, &lower) {
        return Some(catalog_entry(TriggerType::Frustration));
    }
    if contains_any(&lower, SECURITY_KEYWORDS) {
        return Some(catalog_entry(TriggerType::Security));
    }
    if contains_any(&lower, BILLING_KEYWORDS) {
        return Some(catalog_entry(TriggerType::Billing));
    }
    if contains_any(&lower, LEGAL_KEYWORDS) {
        return Some(catalog_entry(TriggerType::Legal));
    }
    if failed_attempts >= FAILED_ATTEMPTS_TRIGGER {
        return Some(catalog_entry(TriggerType::FailedAttempts));
    }
    if contains_any(&lower, TECHNICAL_ACCESS_KEYWORDS) {
        return Some(catalog_entry(TriggerType::TechnicalAccess));
    }
    None
}

/// Issue categories that always route to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Billing,
    Refund,
    AccountSuspension,
    Legal,
    SecurityIncident,
    Technical,
    General,
}

impl IssueCategory {
    fn always_escalates(self) -> bool {
        matches!(
            self,
            IssueCategory::Billing
                | IssueCategory::Refund
                | IssueCategory::AccountSuspension
                | IssueCategory::Legal
                | IssueCategory::SecurityIncident
        )
    }

    fn specialist(self) -> Option<&'static str> {
        match self {
            IssueCategory::Billing | IssueCategory::Refund => Some("billing"),
            IssueCategory::AccountSuspension => Some("account management"),
            IssueCategory::Legal => Some("legal"),
            IssueCategory::SecurityIncident => Some("security"),
            IssueCategory::Technical | IssueCategory::General => None,
        }
    }
}

/// How tangled the issue looks to the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Session-level signals feeding the escalation decision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationSignals {
    pub attempts: u32,
    pub session_duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub explicit_request: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_category: Option<IssueCategory>,
}

/// The gate's verdict for a single inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationDecision {
    pub should_escalate: bool,
    pub reason: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_specialist: Option<String>,
}

impl EscalationDecision {
    fn escalate(reason: &str, priority: Priority, specialist: Option<&str>) -> Self {
        Self {
            should_escalate: true,
            reason: reason.to_string(),
            priority,
            recommended_specialist: specialist.map(str::to_string),
        }
    }

    fn continue_with_ai() -> Self {
        Self {
            should_escalate: false,
            reason: "assistant can continue".to_string(),
            priority: Priority::Low,
            recommended_specialist: None,
        }
    }
}

/// Layer the business rules over the raw signals.
///
/// Branches are evaluated in this exact order and return on first match;
/// the order encodes business priority and must not be reordered.
pub fn evaluate_escalation_need(signals: &EscalationSignals) -> EscalationDecision {
    if signals.explicit_request {
        return EscalationDecision::escalate(
            "user explicitly requested a human agent",
            Priority::High,
            None,
        );
    }

    if let Some(category) = signals.issue_category {
        if category.always_escalates() {
            let priority = if category == IssueCategory::SecurityIncident {
                Priority::Urgent
            } else {
                Priority::High
            };
            return EscalationDecision::escalate(
                "issue category requires a human",
                priority,
                category.specialist(),
            );
        }
    }

    if signals.sentiment == Some(Sentiment::Frustrated) && signals.attempts >= 1 {
        return EscalationDecision::escalate(
            "user is frustrated after a failed attempt",
            Priority::High,
            None,
        );
    }

    if signals.complexity == Some(Complexity::Complex) && signals.session_duration_minutes > 15 {
        return EscalationDecision::escalate(
            "complex issue unresolved after 15 minutes",
            Priority::Medium,
            None,
        );
    }

    if signals.attempts >= 3 {
        return EscalationDecision::escalate(
            "three or more failed resolution attempts",
            Priority::Medium,
            None,
        );
    }

    if signals.session_duration_minutes > 20 && signals.attempts >= 2 {
        return EscalationDecision::escalate(
            "long session with repeated attempts",
            Priority::Low,
            None,
        );
    }

    EscalationDecision::continue_with_ai()
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Trigger detection
    // -----------------------------------------------------------------------

    #[test]
    fn test_detect_explicit_request() {
        let trigger = detect_trigger("I want to speak to a manager", 0).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::ExplicitRequest);
    }

    #[test]
    fn test_detect_frustration_caps_and_exclamation() {
        let trigger = detect_trigger("THIS IS RIDICULOUS!!! WORST SERVICE EVER!!!", 0).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::Frustration);
    }

    #[test]
    fn test_detect_frustration_negative_keywords() {
        let trigger = detect_trigger("this is terrible and completely useless", 0).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::Frustration);
    }

    #[test]
    fn test_detect_technical_access() {
        let trigger = detect_trigger("can you help me debug this API key issue", 0).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::TechnicalAccess);
    }

    #[test]
    fn test_detect_failed_attempts() {
        let trigger = detect_trigger("what's the weather", 3).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::FailedAttempts);
    }

    #[test]
    fn test_failed_attempts_beats_technical_access() {
        // Counter category sits above technical access in the catalog order.
        let trigger = detect_trigger("I lost my api key", 2).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::FailedAttempts);
    }

    #[test]
    fn test_detect_security() {
        let trigger = detect_trigger("I think my account was hacked", 0).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::Security);
        assert_eq!(trigger.priority, Priority::Urgent);
    }

    #[test]
    fn test_detect_billing_and_legal() {
        let billing = detect_trigger("I need a refund for last month", 0).unwrap();
        assert_eq!(billing.trigger_type, TriggerType::Billing);

        let legal = detect_trigger("my lawyer will hear about this", 0).unwrap();
        assert_eq!(legal.trigger_type, TriggerType::Legal);
    }

    #[test]
    fn test_explicit_request_beats_frustration() {
        let trigger =
            detect_trigger("THIS IS AWFUL!!! let me talk to a manager right now", 0).unwrap();
        assert_eq!(trigger.trigger_type, TriggerType::ExplicitRequest);
    }

    #[test]
    fn test_no_trigger_on_ordinary_message() {
        assert!(detect_trigger("what's the weather", 0).is_none());
        assert!(detect_trigger("", 0).is_none());
    }

    #[test]
    fn test_catalog_covers_all_types() {
        assert_eq!(trigger_catalog().len(), 7);
    }

    // -----------------------------------------------------------------------
    // Decision function
    // -----------------------------------------------------------------------

    #[test]
    fn test_explicit_request_is_high_priority() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            attempts: 0,
            session_duration_minutes: 1,
            explicit_request: true,
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::High);
    }

    #[test]
    fn test_security_incident_is_urgent() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            issue_category: Some(IssueCategory::SecurityIncident),
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::Urgent);
        assert_eq!(decision.recommended_specialist.as_deref(), Some("security"));
    }

    #[test]
    fn test_billing_category_is_high_with_specialist() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            issue_category: Some(IssueCategory::Refund),
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::High);
        assert_eq!(decision.recommended_specialist.as_deref(), Some("billing"));
    }

    #[test]
    fn test_general_category_does_not_escalate_alone() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            issue_category: Some(IssueCategory::General),
            ..Default::default()
        });
        assert!(!decision.should_escalate);
    }

    #[test]
    fn test_frustrated_with_attempt_escalates() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            attempts: 1,
            sentiment: Some(Sentiment::Frustrated),
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::High);
    }

    #[test]
    fn test_frustrated_without_attempts_continues() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            attempts: 0,
            sentiment: Some(Sentiment::Frustrated),
            ..Default::default()
        });
        assert!(!decision.should_escalate);
    }

    #[test]
    fn test_complex_issue_over_fifteen_minutes() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            complexity: Some(Complexity::Complex),
            session_duration_minutes: 16,
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::Medium);
    }

    #[test]
    fn test_three_attempts_is_medium() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            attempts: 3,
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::Medium);
    }

    #[test]
    fn test_long_session_with_two_attempts_is_low() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            attempts: 2,
            session_duration_minutes: 21,
            ..Default::default()
        });
        assert!(decision.should_escalate);
        assert_eq!(decision.priority, Priority::Low);
    }

    #[test]
    fn test_quiet_session_continues() {
        let decision = evaluate_escalation_need(&EscalationSignals {
            attempts: 1,
            session_duration_minutes: 5,
            ..Default::default()
        });
        assert!(!decision.should_escalate);
        assert_eq!(decision.priority, Priority::Low);
    }

    #[test]
    fn test_branch_order_explicit_beats_category() {
        // Explicit request must win even when a category would classify
        // differently; the branch order is the contract.
        let decision = evaluate_escalation_need(&EscalationSignals {
            explicit_request: true,
            issue_category: Some(IssueCategory::SecurityIncident),
            ..Default::default()
        });
        assert_eq!(decision.priority, Priority::High);
        assert_eq!(decision.reason, "user explicitly requested a human agent");
    }
}
