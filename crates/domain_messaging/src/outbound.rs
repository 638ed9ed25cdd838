//! Outbound message log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use core_kernel::{CustomerId, MessageId, TenantId};
use crate::error::MessagingError;
use crate::phone::PhoneNumber;
use crate::port::SendReceipt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    Queued,
    Sent,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Queued => "QUEUED",
            MessageStatus::Sent => "SENT",
            MessageStatus::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "QUEUED" => Some(MessageStatus::Queued),
            "SENT" => Some(MessageStatus::Sent),
            "FAILED" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub customer_id: Option<CustomerId>,
    pub to: PhoneNumber,
    /// Template message id, `None` for free-text messages
    pub template: Option<String>,
    pub body: String,
    pub status: MessageStatus,
    pub external_id: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    /// Not sent before this instant (quiet hours)
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl OutboundMessage {
    pub fn queue(
        tenant_id: TenantId,
        to: PhoneNumber,
        body: impl Into<String>,
        scheduled_for: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new_v7(),
            tenant_id,
            customer_id: None,
            to,
            template: None,
            body: body.into(),
            status: MessageStatus::Queued,
            external_id: None,
            error: None,
            attempts: 0,
            scheduled_for,
            created_at: now,
            sent_at: None,
        }
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == MessageStatus::Queued && self.scheduled_for <= now
    }

    /// Queued → Sent
    pub fn mark_sent(&mut self, receipt: SendReceipt, at: DateTime<Utc>) -> Result<(), MessagingError> {
        self.ensure_queued(MessageStatus::Sent)?;
        self.status = MessageStatus::Sent;
        self.attempts += 1;
        self.external_id = receipt.external_id;
        self.error = None;
        self.sent_at = Some(at);
        info!(message = %self.id, to = %self.to.digits(), "message sent");
        Ok(())
    }

    /// Queued → Failed, keeping the error
    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), MessagingError> {
        self.ensure_queued(MessageStatus::Failed)?;
        let error = error.into();
        warn!(message = %self.id, error = %error, "message failed");
        self.status = MessageStatus::Failed;
        self.attempts += 1;
        self.error = Some(error);
        Ok(())
    }

    /// Failed → Queued for another attempt
    pub fn requeue(&mut self, at: DateTime<Utc>) -> Result<(), MessagingError> {
        if self.status != MessageStatus::Failed {
            return Err(MessagingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: MessageStatus::Queued.as_str().to_string(),
            });
        }
        self.status = MessageStatus::Queued;
        self.scheduled_for = at;
        Ok(())
    }

    fn ensure_queued(&self, to: MessageStatus) -> Result<(), MessagingError> {
        if self.status != MessageStatus::Queued {
            return Err(MessagingError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}
