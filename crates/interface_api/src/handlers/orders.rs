//! Order handlers
//!
//! Orders move Draft → Confirmed → Preparing → OutForDelivery → Delivered,
//! or to Cancelled while the edit window is open. Confirmation creates the
//! receivables or settles the sale; delivery earns loyalty points.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use validator::Validate;

use core_kernel::{BankAccountId, Money, OrderId, ProductId, Role};
use domain_messaging::MessageTemplate;
use domain_orders::{Order, OrderStatus};
use infra_db::ConfirmedReceivables;

use crate::auth::Caller;
use crate::dto::sales::*;
use crate::dto::{parse_filter, ListQuery, ReasonRequest};
use crate::error::ApiError;
use crate::notifications::notify_customer;
use crate::AppState;

/// Creates a draft order priced for the customer
pub async fn create_order(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;

    let tenant_id = caller.tenant_id();
    let customer = state.orders.find_customer(tenant_id, request.customer_id.into()).await?;
    if !customer.active {
        return Err(domain_orders::OrderError::InactiveCustomer.into());
    }

    let product_ids: Vec<ProductId> = request.items.iter().map(|i| ProductId::from_uuid(i.product_id)).collect();
    let products = state.orders.find_products(tenant_id, &product_ids).await?;

    let mut order = Order::new(tenant_id, customer.id, customer.customer_type, request.payment_method);
    for item in &request.items {
        let product = products
            .iter()
            .find(|p| *p.id.as_uuid() == item.product_id)
            .ok_or_else(|| ApiError::NotFound(format!("Product with id '{}' not found", item.product_id)))?;
        order.add_item(product, item.quantity)?;
    }
    if let Some(fee) = request.delivery_fee {
        order.set_delivery_fee(Money::brl(fee))?;
    }
    if let Some(discount) = request.discount {
        order.apply_discount(Money::brl(discount))?;
    }
    order.notes = request.notes;

    state.orders.insert_order(&order).await?;
    info!(order = %order.id, number = %order.number, total = %order.total, "order created");
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    query.validate()?;
    let status = parse_filter(query.status.as_deref(), "order status", OrderStatus::parse)?;
    Ok(Json(state.orders.list_orders(caller.tenant_id(), status, query.limit()).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.find_order(caller.tenant_id(), id).await?))
}

/// Confirms an order, creating its receivables and boletos or settling the sale
pub async fn confirm_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(request): Json<ConfirmOrderRequest>,
) -> Result<Json<ConfirmedReceivables>, ApiError> {
    caller.require(Role::Sales)?;
    let tenant_id = caller.tenant_id();
    let (_, rules) = state.tenant_rules(tenant_id).await?;

    let confirmed = state
        .finance
        .confirm_order_receivables(
            tenant_id,
            id,
            &rules,
            &state.services.boleto_issuer,
            request.bank_account_id.map(BankAccountId::from_uuid),
            Utc::now(),
        )
        .await?;

    let order = &confirmed.order;
    let (number, total, delivery_date) = (order.number.clone(), order.total, order.delivery_date);
    notify_customer(&state, tenant_id, order.customer_id, move |customer| MessageTemplate::OrderConfirmation {
        customer_name: customer.name.clone(),
        order_number: number,
        total,
        delivery_date,
    });
    for boleto in &confirmed.boletos {
        let (amount, due_date, line) = (boleto.amount, boleto.due_date, boleto.formatted_line());
        notify_customer(&state, tenant_id, boleto.customer_id, move |customer| MessageTemplate::BoletoIssued {
            customer_name: customer.name.clone(),
            amount,
            due_date,
            digitable_line: line,
        });
    }

    Ok(Json(confirmed))
}

pub async fn prepare_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    caller.require(Role::Sales)?;
    let mut order = state.orders.find_order(caller.tenant_id(), id).await?;
    order.start_preparing()?;
    state.orders.update_order(&order).await?;
    Ok(Json(order))
}

pub async fn dispatch_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    caller.require(Role::Sales)?;
    let mut order = state.orders.find_order(caller.tenant_id(), id).await?;
    order.dispatch()?;
    state.orders.update_order(&order).await?;
    Ok(Json(order))
}

/// Marks an order delivered and credits the customer's loyalty points
///
/// Points are awarded after the delivery is stored; if awarding fails the
/// delivery still stands and the failure is logged.
pub async fn deliver_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<Json<DeliveredOrderResponse>, ApiError> {
    caller.require(Role::Sales)?;
    let tenant_id = caller.tenant_id();
    let now = Utc::now();

    let mut order = state.orders.find_order(tenant_id, id).await?;
    order.deliver(now)?;
    state.orders.update_order(&order).await?;

    let points_awarded = match state
        .loyalty
        .award_order_points(tenant_id, order.id, &state.services.loyalty_program, now)
        .await
    {
        Ok(awarded) => {
            if let Some(referral) = awarded.referral {
                let referred = state.orders.find_customer(tenant_id, referral.referred_id).await?;
                let points = referral.reward_points;
                notify_customer(&state, tenant_id, referral.referrer_id, move |customer| {
                    MessageTemplate::ReferralReward {
                        customer_name: customer.name.clone(),
                        referred_name: referred.name,
                        points,
                    }
                });
            }
            awarded.points
        }
        Err(e) => {
            warn!(order = %order.id, error = %e, "loyalty points not awarded");
            0
        }
    };

    Ok(Json(DeliveredOrderResponse { order, points_awarded }))
}

/// Cancels an order and undoes its receivables, boletos and settled income
pub async fn cancel_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
    Json(request): Json<ReasonRequest>,
) -> Result<Json<Order>, ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;
    let tenant_id = caller.tenant_id();
    let (_, rules) = state.tenant_rules(tenant_id).await?;

    let order = state
        .finance
        .cancel_order(tenant_id, id, request.reason.trim(), &rules, Utc::now())
        .await?;
    Ok(Json(order))
}
