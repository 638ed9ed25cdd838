//! Customer and product handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use tracing::info;
use validator::Validate;

use core_kernel::{CustomerId, Money, ProductId, Role, TaxDocument};
use domain_loyalty::generate_referral_code;
use domain_orders::{Customer, Product};

use crate::auth::Caller;
use crate::dto::sales::*;
use crate::dto::ListQuery;
use crate::error::ApiError;
use crate::AppState;

/// Registers a customer with a fresh referral code
pub async fn create_customer(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;

    let mut customer = Customer::new(caller.tenant_id(), request.name.trim(), request.customer_type)
        .with_credit_limit(Money::brl(request.credit_limit.unwrap_or(Decimal::ZERO)));
    let referral_code = generate_referral_code(&customer.name);
    customer = customer.with_referral_code(referral_code);
    if let Some(document) = request.document.as_deref() {
        customer = customer.with_document(TaxDocument::parse(document)?);
    }
    if let Some(phone) = request.phone {
        customer = customer.with_phone(phone);
    }
    if let Some(email) = request.email {
        customer = customer.with_email(email);
    }

    state.orders.insert_customer(&customer).await?;
    info!(customer = %customer.id, kind = customer.customer_type.as_str(), "customer registered");
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    query.validate()?;
    Ok(Json(state.orders.list_customers(caller.tenant_id(), query.limit()).await?))
}

pub async fn get_customer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(state.orders.find_customer(caller.tenant_id(), id).await?))
}

pub async fn update_customer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(request): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;
    // Raising a credit limit is a finance decision
    if request.credit_limit.is_some() {
        caller.require(Role::Finance)?;
    }

    let mut customer = state.orders.find_customer(caller.tenant_id(), id).await?;
    if let Some(name) = request.name {
        customer.name = name.trim().to_string();
    }
    if let Some(phone) = request.phone {
        customer.phone = Some(phone);
    }
    if let Some(email) = request.email {
        customer.email = Some(email);
    }
    if let Some(limit) = request.credit_limit {
        customer.credit_limit = Money::brl(limit);
    }
    match request.active {
        Some(false) => customer.deactivate(),
        Some(true) => customer.active = true,
        None => {}
    }

    state.orders.update_customer(&customer).await?;
    Ok(Json(customer))
}

pub async fn create_product(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;

    let mut product = Product::new(
        caller.tenant_id(),
        request.sku.trim(),
        request.name.trim(),
        request.unit,
        Money::brl(request.retail_price),
        Money::brl(request.wholesale_price),
        request.wholesale_min_qty.unwrap_or(Decimal::ZERO),
    );
    if let Some(ncm) = request.ncm {
        product = product.with_ncm(ncm);
    }

    state.orders.insert_product(&product).await?;
    info!(product = %product.id, sku = %product.sku, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let active_only = query.active_only.unwrap_or(true);
    Ok(Json(state.orders.list_products(caller.tenant_id(), active_only).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.orders.find_product(caller.tenant_id(), id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<ProductId>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    caller.require(Role::Sales)?;
    request.validate()?;

    let mut product = state.orders.find_product(caller.tenant_id(), id).await?;
    if let Some(name) = request.name {
        product.name = name.trim().to_string();
    }
    if let Some(price) = request.retail_price {
        product.retail_price = Money::brl(price);
    }
    if let Some(price) = request.wholesale_price {
        product.wholesale_price = Money::brl(price);
    }
    if let Some(qty) = request.wholesale_min_qty {
        product.wholesale_min_qty = qty;
    }
    if let Some(active) = request.active {
        product.active = active;
    }

    state.orders.update_product(&product).await?;
    Ok(Json(product))
}
