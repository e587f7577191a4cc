//! End-to-end test wiring a frustrated support conversation through the
//! quality gate, the outbound handoff, and back in through a signed webhook.
//!
//! This validates the full escalation loop:
//! Gate decision → desk handoff (contact/conversation/labels/note/open) →
//! agent reply webhook → signature check → parse → feedback extraction.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use vigil_core::handoff::{
    compute_signature, extract_agent_feedback, parse_webhook, verify_signature, Contact,
    ContactUpdate, Conversation, ConversationStatus, EscalationContext, EscalationHandoff,
    NewContact, NewConversation, NewMessage, ParsedWebhookEvent, SupportDeskApi,
};
use vigil_core::{
    assess, ContextChunk, Priority, SessionCounters, TranscriptTurn, TriggerType,
};

/// In-memory support desk capturing everything the handoff sends.
#[derive(Default)]
struct RecordingDesk {
    conversations: Mutex<Vec<NewConversation>>,
    labels: Mutex<Vec<String>>,
    notes: Mutex<Vec<NewMessage>>,
    status_changes: Mutex<Vec<ConversationStatus>>,
}

#[async_trait]
impl SupportDeskApi for RecordingDesk {
    async fn search_contacts(&self, _query: &str) -> Result<Vec<Contact>, vigil_core::HandoffError> {
        Ok(vec![])
    }

    async fn create_contact(
        &self,
        contact: &NewContact,
    ) -> Result<Contact, vigil_core::HandoffError> {
        Ok(Contact {
            id: 21,
            identifier: Some(contact.identifier.clone()),
            name: Some(contact.name.clone()),
            email: contact.email.clone(),
        })
    }

    async fn update_contact(
        &self,
        contact_id: u64,
        _update: &ContactUpdate,
    ) -> Result<Contact, vigil_core::HandoffError> {
        Ok(Contact {
            id: contact_id,
            identifier: None,
            name: None,
            email: None,
        })
    }

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> Result<Conversation, vigil_core::HandoffError> {
        self.conversations.lock().unwrap().push(conversation.clone());
        Ok(Conversation {
            id: 314,
            status: ConversationStatus::Pending,
        })
    }

    async fn toggle_status(
        &self,
        _conversation_id: u64,
        status: ConversationStatus,
    ) -> Result<(), vigil_core::HandoffError> {
        self.status_changes.lock().unwrap().push(status);
        Ok(())
    }

    async fn set_custom_attributes(
        &self,
        _conversation_id: u64,
        _attributes: &Value,
    ) -> Result<(), vigil_core::HandoffError> {
        Ok(())
    }

    async fn add_labels(
        &self,
        _conversation_id: u64,
        labels: &[String],
    ) -> Result<(), vigil_core::HandoffError> {
        self.labels.lock().unwrap().extend_from_slice(labels);
        Ok(())
    }

    async fn create_message(
        &self,
        _conversation_id: u64,
        message: &NewMessage,
    ) -> Result<u64, vigil_core::HandoffError> {
        self.notes.lock().unwrap().push(message.clone());
        Ok(900)
    }
}

#[tokio::test]
async fn test_escalation_loop_end_to_end() {
    tracing_subscriber::fmt().with_test_writer().try_init().ok();

    // 1. The gate sees an explicit request for a human.
    let context = vec![ContextChunk::new("refund window is 30 days", "kb-refunds", 0.92)];
    let outcome = assess(
        "this isn't working, I want to speak to a manager",
        "The refund window is 30 days [1].",
        &context,
        SessionCounters {
            failed_attempts: 1,
            session_duration_minutes: 9,
        },
    );
    assert!(outcome.decision.should_escalate);
    assert_eq!(outcome.decision.priority, Priority::High);
    assert_eq!(
        outcome.trigger.unwrap().trigger_type,
        TriggerType::ExplicitRequest
    );

    // 2. Hand the conversation to the desk.
    let desk = Arc::new(RecordingDesk::default());
    let handoff = EscalationHandoff::new(desk.clone(), 5);
    let escalation = EscalationContext {
        session_id: "sess-e2e-1".into(),
        user_identifier: "user-314".into(),
        user_name: "Sam".into(),
        user_email: Some("sam@example.com".into()),
        ai_summary: "User asked about refunds, then requested a human.".into(),
        ai_confidence: outcome.check.confidence,
        escalation_reason: outcome.decision.reason.clone(),
        user_sentiment: None,
        ai_turn_count: 4,
        rag_sources: vec!["kb-refunds".into()],
        escalation_query: Some("I want to speak to a manager".into()),
        meeting_url: None,
        escalated_at: Utc::now(),
    };
    let transcript = vec![
        TranscriptTurn::user("how do refunds work?"),
        TranscriptTurn::assistant("The refund window is 30 days [1]."),
        TranscriptTurn::user("this isn't working, I want to speak to a manager"),
    ];

    let result = handoff
        .create_escalation(&escalation, &transcript)
        .await
        .unwrap();
    assert_eq!(result.conversation_id, 314);

    // Conversation carries the deterministic idempotency key and starts pending.
    let conversations = desk.conversations.lock().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].source_id, "escalation-sess-e2e-1");
    assert_eq!(conversations[0].status, ConversationStatus::Pending);
    drop(conversations);

    // Labels, private summary note, and the open toggle all landed.
    assert!(desk
        .labels
        .lock()
        .unwrap()
        .contains(&"ai-escalation".to_string()));
    let notes = desk.notes.lock().unwrap();
    assert_eq!(notes.len(), 1);
    assert!(notes[0].private);
    assert!(notes[0].content.contains("speak to a manager"));
    drop(notes);
    assert_eq!(
        *desk.status_changes.lock().unwrap(),
        vec![ConversationStatus::Open]
    );

    // 3. The desk calls back when an agent replies.
    let secret = "whsec-e2e";
    let callback = json!({
        "event": "message_created",
        "content": "Hi Sam, I've issued the refund manually.",
        "message_type": "outgoing",
        "private": false,
        "created_at": "2026-08-06T11:00:00Z",
        "sender": { "id": 8, "type": "user" },
        "conversation": {
            "id": 314,
            "status": "open",
            "custom_attributes": { "session_id": "sess-e2e-1" }
        }
    })
    .to_string();
    let body = callback.as_bytes();

    let signature = compute_signature(secret, body);
    verify_signature(Some(secret), body, Some(&signature)).unwrap();

    // A tampered body must not verify.
    let mut tampered = body.to_vec();
    tampered[0] ^= 0x01;
    assert!(verify_signature(Some(secret), &tampered, Some(&signature)).is_err());

    // 4. Parse and extract the agent's reply for the feedback loop.
    let event = parse_webhook(body);
    let ParsedWebhookEvent::MessageCreated(ref message) = event else {
        panic!("expected MessageCreated, got {event:?}");
    };
    assert!(message.is_agent_message());

    let feedback = extract_agent_feedback(&event).expect("agent reply is extractable");
    assert_eq!(feedback.session_id, "sess-e2e-1");
    assert_eq!(feedback.conversation_id, 314);
    assert!(feedback.agent_response.contains("issued the refund"));
}

#[tokio::test]
async fn test_resolution_webhook_closes_the_loop() {
    let body = json!({
        "event": "conversation_resolved",
        "conversation": {
            "id": 314,
            "status": "resolved",
            "custom_attributes": { "session_id": "sess-e2e-1" }
        }
    })
    .to_string();

    // No secret configured: the development bypass accepts the request.
    verify_signature(None, body.as_bytes(), None).unwrap();

    match parse_webhook(body.as_bytes()) {
        ParsedWebhookEvent::ConversationResolved(info) => {
            assert_eq!(info.conversation_id, 314);
            assert_eq!(info.session_id.as_deref(), Some("sess-e2e-1"));
        }
        other => panic!("expected ConversationResolved, got {other:?}"),
    }
}
