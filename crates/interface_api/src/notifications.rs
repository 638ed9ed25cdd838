//! Customer notifications over WhatsApp
//!
//! Notifications are best effort: they run after the business operation has
//! committed and a failure is only logged.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use core_kernel::{CustomerId, TenantId};
use domain_messaging::{MessageStatus, MessageTemplate, PhoneNumber};
use domain_orders::Customer;

use crate::error::ApiError;
use crate::AppState;

/// Queued messages handled per dispatch round
const DISPATCH_BATCH: i64 = 200;

/// Renders, logs and sends a template to a customer in the background
///
/// Customers without a phone number are skipped; messages rendered during
/// quiet hours stay queued for the next dispatch round.
pub fn notify_customer<F>(state: &AppState, tenant_id: TenantId, customer_id: CustomerId, build: F)
where
    F: FnOnce(&Customer) -> MessageTemplate + Send + 'static,
{
    if state.services.notifier.is_none() {
        return;
    }
    let state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = deliver(&state, tenant_id, customer_id, build, Utc::now()).await {
            warn!(customer = %customer_id, error = %e, "notification not sent");
        }
    });
}

async fn deliver<F>(
    state: &AppState,
    tenant_id: TenantId,
    customer_id: CustomerId,
    build: F,
    now: DateTime<Utc>,
) -> Result<(), ApiError>
where
    F: FnOnce(&Customer) -> MessageTemplate,
{
    let Some(notifier) = &state.services.notifier else {
        return Ok(());
    };
    let customer = state.orders.find_customer(tenant_id, customer_id).await?;
    let Some(phone) = customer.phone.as_deref() else {
        debug!(customer = %customer_id, "customer has no phone, notification skipped");
        return Ok(());
    };

    let to = PhoneNumber::parse_br(phone)?;
    let template = build(&customer);
    let mut message = notifier.prepare(tenant_id, Some(customer.id), to, &template, now)?;
    state.messages.insert(&message).await?;
    if notifier.dispatch(&mut message, now).await? {
        state.messages.update(&message).await?;
    }
    Ok(())
}

/// Sends every queued message whose quiet-hours deferral has passed
///
/// Returns how many went out.
pub async fn dispatch_due(state: &AppState, now: DateTime<Utc>) -> Result<usize, ApiError> {
    let Some(notifier) = &state.services.notifier else {
        return Ok(0);
    };
    let mut sent = 0;
    for mut message in state.messages.list_due(now, DISPATCH_BATCH).await? {
        if notifier.dispatch(&mut message, now).await? {
            state.messages.update(&message).await?;
            if message.status == MessageStatus::Sent {
                sent += 1;
            }
        }
    }
    if sent > 0 {
        info!(sent, "deferred notifications sent");
    }
    Ok(sent)
}
