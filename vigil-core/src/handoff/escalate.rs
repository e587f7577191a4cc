//! Outbound escalation: hands a conversation to the support desk.
//!
//! Five sequential steps, each depending on the previous one's output:
//! find-or-create contact, create the conversation (pending), attach labels,
//! post the AI-context summary as a private note, then open the conversation
//! to notify agents. The conversation's `source_id` is derived from the
//! session id and acts as the idempotency anchor: the desk dedups on it, and
//! `publish` can be re-run against an existing conversation id after a
//! partial failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::HandoffError;
use crate::types::{Sentiment, Speaker, TranscriptTurn};

use super::client::{
    Contact, ContactUpdate, ConversationStatus, NewContact, NewConversation, NewMessage,
    SupportDeskApi,
};

/// Transcript turns included in the summary note.
const SUMMARY_TRANSCRIPT_TURNS: usize = 10;

/// The payload handed to the external system. Immutable once sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationContext {
    pub session_id: String,
    /// Stable identifier for the end user on the desk side.
    pub user_identifier: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub ai_summary: String,
    /// Assistant confidence in [0,1] at the moment of escalation.
    pub ai_confidence: f64,
    pub escalation_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_sentiment: Option<Sentiment>,
    pub ai_turn_count: u32,
    #[serde(default)]
    pub rag_sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    pub escalated_at: DateTime<Utc>,
}

/// Ids produced by a completed escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationOutcome {
    pub contact_id: u64,
    pub conversation_id: u64,
}

/// Deterministic conversation source id for a session.
pub fn source_id_for_session(session_id: &str) -> String {
    format!("escalation-{session_id}")
}

/// Orchestrates the outbound handoff against the desk API seam.
pub struct EscalationHandoff {
    api: Arc<dyn SupportDeskApi>,
    inbox_id: u64,
}

impl EscalationHandoff {
    pub fn new(api: Arc<dyn SupportDeskApi>, inbox_id: u64) -> Self {
        Self { api, inbox_id }
    }

    /// Full handoff: ensure the conversation exists, then publish labels,
    /// summary, and the open-status toggle.
    ///
    /// Errors propagate to the caller; there is no automatic retry here.
    /// After a failure past conversation creation, call
    /// [`EscalationHandoff::publish`] with the conversation id to finish the
    /// remaining steps — labels and notes are additive and the status toggle
    /// is idempotent.
    pub async fn create_escalation(
        &self,
        context: &EscalationContext,
        transcript: &[TranscriptTurn],
    ) -> Result<EscalationOutcome, HandoffError> {
        let outcome = self.ensure_conversation(context).await?;
        self.publish(outcome.conversation_id, context, transcript)
            .await?;
        Ok(outcome)
    }

    /// Steps 1-2: find-or-create the contact and the pending conversation.
    pub async fn ensure_conversation(
        &self,
        context: &EscalationContext,
    ) -> Result<EscalationOutcome, HandoffError> {
        let contact = self.find_or_create_contact(context).await?;

        let conversation = self
            .api
            .create_conversation(&NewConversation {
                source_id: source_id_for_session(&context.session_id),
                inbox_id: self.inbox_id,
                contact_id: contact.id,
                status: ConversationStatus::Pending,
                custom_attributes: json!({ "session_id": context.session_id }),
            })
            .await?;

        // Inbound webhooks correlate callbacks through these attributes.
        self.api
            .set_custom_attributes(
                conversation.id,
                &json!({
                    "session_id": context.session_id,
                    "escalation_reason": context.escalation_reason,
                    "ai_confidence": context.ai_confidence,
                }),
            )
            .await?;

        info!(
            session_id = %context.session_id,
            conversation_id = conversation.id,
            "escalation conversation created"
        );
        Ok(EscalationOutcome {
            contact_id: contact.id,
            conversation_id: conversation.id,
        })
    }

    /// Steps 3-5: labels, summary note, open. Safe to re-run.
    pub async fn publish(
        &self,
        conversation_id: u64,
        context: &EscalationContext,
        transcript: &[TranscriptTurn],
    ) -> Result<(), HandoffError> {
        self.api
            .add_labels(conversation_id, &derive_labels(context))
            .await?;

        self.api
            .create_message(
                conversation_id,
                &NewMessage::private_note(build_summary(context, transcript)),
            )
            .await?;

        self.api
            .toggle_status(conversation_id, ConversationStatus::Open)
            .await?;

        info!(conversation_id, "escalation handed to agents");
        Ok(())
    }

    async fn find_or_create_contact(
        &self,
        context: &EscalationContext,
    ) -> Result<Contact, HandoffError> {
        let matches = self.api.search_contacts(&context.user_identifier).await?;
        if let Some(existing) = matches
            .into_iter()
            .find(|c| c.identifier.as_deref() == Some(context.user_identifier.as_str()))
        {
            // Keep the desk's copy of the name/email current.
            return self
                .api
                .update_contact(
                    existing.id,
                    &ContactUpdate {
                        name: Some(context.user_name.clone()),
                        email: context.user_email.clone(),
                    },
                )
                .await;
        }

        self.api
            .create_contact(&NewContact {
                inbox_id: self.inbox_id,
                identifier: context.user_identifier.clone(),
                name: context.user_name.clone(),
                email: context.user_email.clone(),
            })
            .await
    }
}

/// Labels derived from the escalation reason, sentiment, and meeting state.
pub fn derive_labels(context: &EscalationContext) -> Vec<String> {
    let mut labels = vec!["ai-escalation".to_string()];
    labels.push(format!("reason-{}", slugify(&context.escalation_reason)));
    if let Some(sentiment) = context.user_sentiment {
        let tag = match sentiment {
            Sentiment::Positive => "sentiment-positive",
            Sentiment::Neutral => "sentiment-neutral",
            Sentiment::Frustrated => "sentiment-frustrated",
        };
        labels.push(tag.to_string());
    }
    if context.meeting_url.is_some() {
        labels.push("meeting-booked".to_string());
    }
    labels
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Markdown summary posted as a private note for the receiving agent.
pub fn build_summary(context: &EscalationContext, transcript: &[TranscriptTurn]) -> String {
    let mut note = String::from("## AI Handoff Summary\n\n");
    note.push_str(&format!("**Reason:** {}\n", context.escalation_reason));
    note.push_str(&format!(
        "**AI confidence:** {:.0}%\n",
        context.ai_confidence * 100.0
    ));
    note.push_str(&format!("**AI turns:** {}\n", context.ai_turn_count));
    if let Some(sentiment) = context.user_sentiment {
        note.push_str(&format!("**User sentiment:** {sentiment:?}\n"));
    }
    if let Some(url) = &context.meeting_url {
        note.push_str(&format!("**Meeting:** {url}\n"));
    }
    if let Some(query) = &context.escalation_query {
        note.push_str(&format!("**Triggering message:** {query}\n"));
    }
    note.push_str(&format!("\n{}\n", context.ai_summary));

    if !context.rag_sources.is_empty() {
        note.push_str("\n**Knowledge sources consulted:**\n");
        for source in &context.rag_sources {
            note.push_str(&format!("- {source}\n"));
        }
    }

    if !transcript.is_empty() {
        note.push_str("\n**Recent transcript:**\n");
        let start = transcript.len().saturating_sub(SUMMARY_TRANSCRIPT_TURNS);
        for turn in &transcript[start..] {
            let who = match turn.speaker {
                Speaker::User => "User",
                Speaker::Assistant => "AI",
            };
            note.push_str(&format!("> **{who}:** {}\n", turn.content));
        }
    }

    note
}
