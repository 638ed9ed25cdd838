//! Notification dispatch

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use core_kernel::{CustomerId, TenantId};
use crate::error::MessagingError;
use crate::outbound::OutboundMessage;
use crate::phone::PhoneNumber;
use crate::port::MessagingPort;
use crate::quiet_hours::QuietHours;
use crate::templates::{MessageTemplate, Templates};

/// Renders notifications, schedules them around quiet hours and sends them
#[derive(Clone)]
pub struct Notifier {
    port: Arc<dyn MessagingPort>,
    templates: Arc<Templates>,
    quiet_hours: QuietHours,
    instance: String,
}

impl Notifier {
    pub fn new(
        port: Arc<dyn MessagingPort>,
        templates: Arc<Templates>,
        quiet_hours: QuietHours,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            port,
            templates,
            quiet_hours,
            instance: instance.into(),
        }
    }

    pub fn quiet_hours(&self) -> &QuietHours {
        &self.quiet_hours
    }

    /// Renders a template into a queued message, deferred past quiet hours
    pub fn prepare(
        &self,
        tenant_id: TenantId,
        customer_id: Option<CustomerId>,
        to: PhoneNumber,
        template: &MessageTemplate,
        now: DateTime<Utc>,
    ) -> Result<OutboundMessage, MessagingError> {
        let body = self.templates.render(template)?;
        let mut message = OutboundMessage::queue(tenant_id, to, body, self.quiet_hours.next_allowed(now))
            .with_template(template.message_id());
        if let Some(customer_id) = customer_id {
            message = message.for_customer(customer_id);
        }
        Ok(message)
    }

    /// Sends a queued message if it is due; returns whether it was attempted
    ///
    /// Gateway failures are recorded on the message rather than returned.
    #[instrument(skip(self, message), fields(message = %message.id))]
    pub async fn dispatch(
        &self,
        message: &mut OutboundMessage,
        now: DateTime<Utc>,
    ) -> Result<bool, MessagingError> {
        if !message.is_due(now) {
            debug!(scheduled_for = %message.scheduled_for, "message not due yet");
            return Ok(false);
        }
        match self.port.send_text(&self.instance, &message.to, &message.body).await {
            Ok(receipt) => message.mark_sent(receipt, now)?,
            Err(error) => message.mark_failed(error.to_string())?,
        }
        Ok(true)
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("instance", &self.instance)
            .field("quiet_hours", &self.quiet_hours)
            .finish()
    }
}
