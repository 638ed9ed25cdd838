//! WhatsApp handlers: free-text messages and the gateway webhook

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};
use validator::Validate;

use core_kernel::{CustomerId, Role};
use domain_messaging::{MessageStatus, OutboundMessage, PhoneNumber, WebhookEvent};

use crate::auth::Caller;
use crate::dto::messaging::*;
use crate::dto::{parse_filter, ListQuery};
use crate::error::ApiError;
use crate::AppState;

/// Header the gateway sends the shared webhook key in
const WEBHOOK_KEY_HEADER: &str = "apikey";

/// Sends a free-text message right away, ignoring quiet hours
///
/// The attempt is logged either way; a gateway failure is stored on the
/// message before the error is returned.
pub async fn send_message(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<OutboundMessage>), ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;
    let port = state
        .services
        .messaging_port
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("WhatsApp gateway is not configured".to_string()))?;

    let tenant_id = caller.tenant_id();
    let to = PhoneNumber::parse_br(&request.phone)?;
    let now = Utc::now();
    let mut message = OutboundMessage::queue(tenant_id, to, request.text, now);
    if let Some(customer_id) = request.customer_id {
        let customer = state.orders.find_customer(tenant_id, CustomerId::from_uuid(customer_id)).await?;
        message = message.for_customer(customer.id);
    }
    state.messages.insert(&message).await?;

    match port.send_text(&state.config.evolution_instance, &message.to, &message.body).await {
        Ok(receipt) => {
            message.mark_sent(receipt, Utc::now())?;
            state.messages.update(&message).await?;
            Ok((StatusCode::CREATED, Json(message)))
        }
        Err(e) => {
            message.mark_failed(e.to_string())?;
            state.messages.update(&message).await?;
            Err(e.into())
        }
    }
}

pub async fn list_messages(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OutboundMessage>>, ApiError> {
    query.validate()?;
    let status = parse_filter(query.status.as_deref(), "message status", MessageStatus::parse)?;
    Ok(Json(state.messages.list(caller.tenant_id(), status, query.limit()).await?))
}

/// Receives Evolution API events
///
/// Public route; the gateway authenticates with the shared key configured
/// on both sides. Inbound texts are logged for the attendants.
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let expected = state.config.webhook_key.as_str();
    if expected.is_empty() {
        return Err(ApiError::ServiceUnavailable("webhook key is not configured".to_string()));
    }
    let provided = headers
        .get(WEBHOOK_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided != expected {
        warn!("webhook rejected: bad key");
        return Err(ApiError::Unauthorized);
    }

    let event = WebhookEvent::parse(&body)?;
    match &event {
        WebhookEvent::MessageReceived(inbound) if !inbound.from_me && !inbound.is_group() => {
            info!(
                instance = %inbound.instance,
                from = %inbound.remote_jid,
                name = inbound.push_name.as_deref().unwrap_or_default(),
                "inbound WhatsApp message"
            );
        }
        WebhookEvent::ConnectionUpdate { instance, state } => {
            info!(instance = %instance, state = %state, "WhatsApp connection update");
        }
        other => debug!(event = ?other, "webhook event ignored"),
    }
    Ok(Json(WebhookResponse { received: event }))
}
