//! Inbound webhook handling: signature verification and event parsing.
//!
//! The support desk POSTs lifecycle events with an HMAC-SHA256 hex signature
//! of the raw body in a header. Verification happens before parsing; a
//! signature mismatch is unauthorized and the body is never inspected.
//! Parsing itself is total: anything malformed or unrecognized degrades to
//! [`ParsedWebhookEvent::Unknown`] so the endpoint can log and move on.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::warn;

use crate::error::HandoffError;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 signature for a body.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time equality: length check first, then XOR-accumulate.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Verify a webhook signature over the raw request body.
///
/// With no secret configured, verification always passes. This is an
/// explicit development-mode bypass and is INSECURE: any caller can forge
/// events. Production deployments must configure a secret.
pub fn verify_signature(
    secret: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), HandoffError> {
    let Some(secret) = secret else {
        warn!("webhook secret not configured; accepting unsigned request");
        return Ok(());
    };
    let Some(signature) = signature else {
        return Err(HandoffError::Signature);
    };
    let expected = compute_signature(secret, body);
    if constant_time_eq(expected.as_bytes(), signature.trim().as_bytes()) {
        Ok(())
    } else {
        Err(HandoffError::Signature)
    }
}

/// Conversation fields extracted from an event payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationInfo {
    pub conversation_id: u64,
    pub status: Option<String>,
    /// Correlation id planted in custom attributes at escalation time.
    pub session_id: Option<String>,
}

/// A `message_created` event with its classification inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub conversation_id: u64,
    pub content: String,
    pub message_type: Option<String>,
    pub private: bool,
    pub sender_type: Option<String>,
    pub session_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl MessageEvent {
    /// An agent reply: outgoing, authored by a desk user.
    pub fn is_agent_message(&self) -> bool {
        self.message_type.as_deref() == Some("outgoing")
            && self
                .sender_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case("user"))
    }

    pub fn is_private_note(&self) -> bool {
        self.private
    }
}

/// Tagged union over the desk's event shapes.
///
/// Constructed per inbound request and discarded after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedWebhookEvent {
    ConversationCreated(ConversationInfo),
    ConversationStatusChanged(ConversationInfo),
    ConversationUpdated(ConversationInfo),
    ConversationResolved(ConversationInfo),
    MessageCreated(MessageEvent),
    Unknown,
}

#[derive(Debug, Deserialize)]
struct RawConversation {
    id: Option<u64>,
    status: Option<String>,
    #[serde(default)]
    custom_attributes: Value,
}

impl RawConversation {
    fn session_id(&self) -> Option<String> {
        self.custom_attributes
            .get("session_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct RawSender {
    #[serde(rename = "type")]
    sender_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessageCreated {
    content: Option<String>,
    message_type: Option<String>,
    #[serde(default)]
    private: bool,
    sender: Option<RawSender>,
    conversation: Option<RawConversation>,
    created_at: Option<DateTime<Utc>>,
}

fn parse_conversation_event(value: &Value) -> Option<ConversationInfo> {
    let raw: RawConversation =
        serde_json::from_value(value.get("conversation").cloned().unwrap_or(Value::Null))
            .ok()
            .or_else(|| serde_json::from_value(value.clone()).ok())?;
    Some(ConversationInfo {
        conversation_id: raw.id?,
        status: raw.status.clone(),
        session_id: raw.session_id(),
    })
}

fn parse_message_created(value: &Value) -> Option<MessageEvent> {
    let raw: RawMessageCreated = serde_json::from_value(value.clone()).ok()?;
    let conversation = raw.conversation?;
    Some(MessageEvent {
        conversation_id: conversation.id?,
        content: raw.content.unwrap_or_default(),
        message_type: raw.message_type,
        private: raw.private,
        sender_type: raw.sender.and_then(|s| s.sender_type),
        session_id: conversation.session_id(),
        created_at: raw.created_at,
    })
}

/// Parse a raw webhook body into a typed event.
///
/// Never errors: unknown discriminants and schema mismatches both yield
/// [`ParsedWebhookEvent::Unknown`].
pub fn parse_webhook(body: &[u8]) -> ParsedWebhookEvent {
    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "unparseable webhook body");
            return ParsedWebhookEvent::Unknown;
        }
    };

    let event = value.get("event").and_then(Value::as_str).unwrap_or("");
    match event {
        "conversation_created" => parse_conversation_event(&value)
            .map(ParsedWebhookEvent::ConversationCreated)
            .unwrap_or(ParsedWebhookEvent::Unknown),
        "conversation_status_changed" => parse_conversation_event(&value)
            .map(ParsedWebhookEvent::ConversationStatusChanged)
            .unwrap_or(ParsedWebhookEvent::Unknown),
        "conversation_updated" => parse_conversation_event(&value)
            .map(ParsedWebhookEvent::ConversationUpdated)
            .unwrap_or(ParsedWebhookEvent::Unknown),
        "conversation_resolved" => parse_conversation_event(&value)
            .map(ParsedWebhookEvent::ConversationResolved)
            .unwrap_or(ParsedWebhookEvent::Unknown),
        "message_created" => parse_message_created(&value)
            .map(ParsedWebhookEvent::MessageCreated)
            .unwrap_or(ParsedWebhookEvent::Unknown),
        other => {
            if !other.is_empty() {
                warn!(event = other, "unknown webhook event type");
            }
            ParsedWebhookEvent::Unknown
        }
    }
}

/// An agent reply captured for the training feedback loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentFeedback {
    pub session_id: String,
    pub agent_response: String,
    pub conversation_id: u64,
    pub timestamp: DateTime<Utc>,
}

/// Extract feedback-loop data from an event.
///
/// Only agent messages qualify: outgoing, authored by a desk user, not a
/// private note, correlated to a session, with non-empty content. All four
/// conditions are required.
pub fn extract_agent_feedback(event: &ParsedWebhookEvent) -> Option<AgentFeedback> {
    let ParsedWebhookEvent::MessageCreated(message) = event else {
        return None;
    };
    if !message.is_agent_message() || message.is_private_note() {
        return None;
    }
    let session_id = message.session_id.clone()?;
    if message.content.trim().is_empty() {
        return None;
    }
    Some(AgentFeedback {
        session_id,
        agent_response: message.content.clone(),
        conversation_id: message.conversation_id,
        timestamp: message.created_at.unwrap_or_else(Utc::now),
    })
}
