//! Typed client for the external support-desk REST API.
//!
//! The `SupportDeskApi` trait is the seam: orchestration code and tests run
//! against it, while `HttpSupportDeskClient` is the reqwest implementation
//! speaking the desk's account-scoped endpoints with static token auth.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::SupportDeskConfig;
use crate::error::HandoffError;

/// External contact mirror. Owned by the support desk; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Payload for `POST /contacts`.
#[derive(Debug, Clone, Serialize)]
pub struct NewContact {
    pub inbox_id: u64,
    pub identifier: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Payload for `PUT /contacts/{id}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Conversation lifecycle status on the support desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Pending,
    Open,
    Resolved,
    Snoozed,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Pending => "pending",
            ConversationStatus::Open => "open",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Snoozed => "snoozed",
        }
    }
}

/// External conversation mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: u64,
    pub status: ConversationStatus,
}

/// Payload for `POST /conversations`.
#[derive(Debug, Clone, Serialize)]
pub struct NewConversation {
    /// Deterministic idempotency key; the desk dedups on it.
    pub source_id: String,
    pub inbox_id: u64,
    pub contact_id: u64,
    pub status: ConversationStatus,
    pub custom_attributes: Value,
}

/// Payload for `POST /conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub content: String,
    pub message_type: String,
    pub private: bool,
}

impl NewMessage {
    /// An internal note visible to agents only.
    pub fn private_note(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: "outgoing".into(),
            private: true,
        }
    }
}

/// The support-desk REST surface used by the handoff pipeline.
#[async_trait]
pub trait SupportDeskApi: Send + Sync {
    async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>, HandoffError>;
    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, HandoffError>;
    async fn update_contact(
        &self,
        contact_id: u64,
        update: &ContactUpdate,
    ) -> Result<Contact, HandoffError>;
    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> Result<Conversation, HandoffError>;
    async fn toggle_status(
        &self,
        conversation_id: u64,
        status: ConversationStatus,
    ) -> Result<(), HandoffError>;
    async fn set_custom_attributes(
        &self,
        conversation_id: u64,
        attributes: &Value,
    ) -> Result<(), HandoffError>;
    async fn add_labels(&self, conversation_id: u64, labels: &[String]) -> Result<(), HandoffError>;
    async fn create_message(
        &self,
        conversation_id: u64,
        message: &NewMessage,
    ) -> Result<u64, HandoffError>;
}

/// Map a non-2xx response to the error taxonomy.
fn map_error(status: u16, body: String) -> HandoffError {
    match status {
        404 => HandoffError::NotFound {
            resource: if body.is_empty() {
                "resource".to_string()
            } else {
                body
            },
        },
        422 => {
            // The desk reports validation failures as
            // {"message": "...", "attributes": ["field", ...]}.
            let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
            let message = parsed
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(&body)
                .to_string();
            let field = parsed
                .pointer("/attributes/0")
                .and_then(Value::as_str)
                .map(str::to_string);
            HandoffError::Validation { message, field }
        }
        _ => HandoffError::Api { status, body },
    }
}

/// Real client using reqwest.
pub struct HttpSupportDeskClient {
    client: Client,
    base_url: String,
    account_id: u64,
    api_token: String,
}

impl HttpSupportDeskClient {
    pub fn new(config: &SupportDeskConfig) -> Result<Self, HandoffError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            account_id: config.account_id,
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/accounts/{}/{}", self.base_url, self.account_id, path)
    }

    async fn handle_response(resp: reqwest::Response) -> Result<Value, HandoffError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(map_error(status.as_u16(), body));
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| HandoffError::Validation {
            message: format!("unparseable response body: {e}"),
            field: None,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, HandoffError> {
        debug!(path, "support desk POST");
        let resp = self
            .client
            .post(self.url(path))
            .header("api_access_token", &self.api_token)
            .json(body)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, HandoffError> {
        debug!(path, "support desk PUT");
        let resp = self
            .client
            .put(self.url(path))
            .header("api_access_token", &self.api_token)
            .json(body)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, HandoffError> {
        debug!(path, "support desk GET");
        let resp = self
            .client
            .get(self.url(path))
            .header("api_access_token", &self.api_token)
            .query(query)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    /// Contacts come back either at the root or under `payload`/`payload.contact`
    /// depending on the endpoint.
    fn parse_contact(value: &Value) -> Result<Contact, HandoffError> {
        let candidate = value
            .pointer("/payload/contact")
            .or_else(|| value.get("payload"))
            .unwrap_or(value);
        serde_json::from_value(candidate.clone()).map_err(|e| HandoffError::Validation {
            message: format!("unparseable contact payload: {e}"),
            field: None,
        })
    }

    fn parse_conversation(value: &Value) -> Result<Conversation, HandoffError> {
        let candidate = value.get("payload").unwrap_or(value);
        serde_json::from_value(candidate.clone()).map_err(|e| HandoffError::Validation {
            message: format!("unparseable conversation payload: {e}"),
            field: None,
        })
    }
}

#[async_trait]
impl SupportDeskApi for HttpSupportDeskClient {
    async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>, HandoffError> {
        let value = self.get("contacts/search", &[("q", query)]).await?;
        let list = value
            .get("payload")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut contacts = Vec::with_capacity(list.len());
        for item in &list {
            contacts.push(Self::parse_contact(item)?);
        }
        Ok(contacts)
    }

    async fn create_contact(&self, contact: &NewContact) -> Result<Contact, HandoffError> {
        let value = self.post("contacts", &json!(contact)).await?;
        Self::parse_contact(&value)
    }

    async fn update_contact(
        &self,
        contact_id: u64,
        update: &ContactUpdate,
    ) -> Result<Contact, HandoffError> {
        let value = self
            .put(&format!("contacts/{contact_id}"), &json!(update))
            .await?;
        Self::parse_contact(&value)
    }

    async fn create_conversation(
        &self,
        conversation: &NewConversation,
    ) -> Result<Conversation, HandoffError> {
        let value = self.post("conversations", &json!(conversation)).await?;
        Self::parse_conversation(&value)
    }

    async fn toggle_status(
        &self,
        conversation_id: u64,
        status: ConversationStatus,
    ) -> Result<(), HandoffError> {
        self.post(
            &format!("conversations/{conversation_id}/toggle_status"),
            &json!({ "status": status.as_str() }),
        )
        .await?;
        Ok(())
    }

    async fn set_custom_attributes(
        &self,
        conversation_id: u64,
        attributes: &Value,
    ) -> Result<(), HandoffError> {
        self.post(
            &format!("conversations/{conversation_id}/custom_attributes"),
            &json!({ "custom_attributes": attributes }),
        )
        .await?;
        Ok(())
    }

    async fn add_labels(&self, conversation_id: u64, labels: &[String]) -> Result<(), HandoffError> {
        self.post(
            &format!("conversations/{conversation_id}/labels"),
            &json!({ "labels": labels }),
        )
        .await?;
        Ok(())
    }

    async fn create_message(
        &self,
        conversation_id: u64,
        message: &NewMessage,
    ) -> Result<u64, HandoffError> {
        let value = self
            .post(
                &format!("conversations/{conversation_id}/messages"),
                &json!(message),
            )
            .await?;
        value
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| HandoffError::Validation {
                message: "message response missing id".into(),
                field: None,
            })
    }
}
