//! Inbound gateway webhooks

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MessagingError;

/// A text received from (or echoed back for) a WhatsApp chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub instance: String,
    pub remote_jid: String,
    pub message_id: Option<String>,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub text: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

impl InboundMessage {
    /// Whether the chat is a group rather than a person
    pub fn is_group(&self) -> bool {
        self.remote_jid.ends_with("@g.us")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WebhookEvent {
    MessageReceived(InboundMessage),
    ConnectionUpdate { instance: String, state: String },
    /// Events the application does not act on
    Ignored { name: String },
}

impl WebhookEvent {
    /// Parses an Evolution API webhook body
    ///
    /// Event names arrive either as `messages.upsert` or `MESSAGES_UPSERT`
    /// depending on the gateway version.
    pub fn parse(body: &Value) -> Result<Self, MessagingError> {
        let event = body
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| MessagingError::InvalidWebhook("missing 'event'".to_string()))?;
        let instance = body
            .get("instance")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let data = body.get("data").unwrap_or(&Value::Null);

        match event.to_ascii_lowercase().replace('_', ".").as_str() {
            "messages.upsert" => Self::parse_message(instance, data),
            "connection.update" => {
                let state = data
                    .get("state")
                    .and_then(Value::as_str)
                    .ok_or_else(|| MessagingError::InvalidWebhook("missing connection state".to_string()))?;
                Ok(WebhookEvent::ConnectionUpdate {
                    instance,
                    state: state.to_string(),
                })
            }
            _ => Ok(WebhookEvent::Ignored {
                name: event.to_string(),
            }),
        }
    }

    fn parse_message(instance: String, data: &Value) -> Result<Self, MessagingError> {
        // Some versions deliver a batch under data.messages
        let data = data
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|m| m.first())
            .unwrap_or(data);
        let key = data
            .get("key")
            .ok_or_else(|| MessagingError::InvalidWebhook("missing message key".to_string()))?;
        let remote_jid = key
            .get("remoteJid")
            .and_then(Value::as_str)
            .ok_or_else(|| MessagingError::InvalidWebhook("missing remoteJid".to_string()))?;

        let message = data.get("message");
        let text = message
            .and_then(|m| m.get("conversation"))
            .or_else(|| message.and_then(|m| m.pointer("/extendedTextMessage/text")))
            .and_then(Value::as_str)
            .map(str::to_string);
        let received_at = data
            .get("messageTimestamp")
            .and_then(|t| t.as_i64().or_else(|| t.as_str().and_then(|s| s.parse().ok())))
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok(WebhookEvent::MessageReceived(InboundMessage {
            instance,
            remote_jid: remote_jid.to_string(),
            message_id: key.get("id").and_then(Value::as_str).map(str::to_string),
            from_me: key.get("fromMe").and_then(Value::as_bool).unwrap_or(false),
            push_name: data.get("pushName").and_then(Value::as_str).map(str::to_string),
            text,
            received_at,
        }))
    }
}
