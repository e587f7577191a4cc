//! Escalation handoff: outbound REST orchestration against the external
//! support desk, and inbound webhook verification/parsing.

pub mod client;
pub mod escalate;
pub mod webhook;

pub use client::{
    Contact, ContactUpdate, Conversation, ConversationStatus, HttpSupportDeskClient, NewContact,
    NewConversation, NewMessage, SupportDeskApi,
};
pub use escalate::{
    build_summary, derive_labels, source_id_for_session, EscalationContext, EscalationHandoff,
    EscalationOutcome,
};
pub use webhook::{
    compute_signature, extract_agent_feedback, parse_webhook, verify_signature, AgentFeedback,
    ConversationInfo, MessageEvent, ParsedWebhookEvent,
};
