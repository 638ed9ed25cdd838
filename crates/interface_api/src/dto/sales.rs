//! Customers, products and orders

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_orders::{CustomerType, Order, PaymentMethod, Unit};

use super::{non_negative, positive};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub customer_type: CustomerType,
    /// CPF or CNPJ, formatted or digits only
    #[validate(length(min = 11, max = 18))]
    pub document: Option<String>,
    #[validate(length(min = 8, max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub credit_limit: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 8, max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub credit_limit: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 60))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub unit: Unit,
    #[validate(custom(function = "positive"))]
    pub retail_price: Decimal,
    #[validate(custom(function = "positive"))]
    pub wholesale_price: Decimal,
    /// Quantity from which the wholesale price applies to retail customers
    #[validate(custom(function = "non_negative"))]
    pub wholesale_min_qty: Option<Decimal>,
    #[validate(length(equal = 8))]
    pub ncm: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(custom(function = "positive"))]
    pub retail_price: Option<Decimal>,
    #[validate(custom(function = "positive"))]
    pub wholesale_price: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub wholesale_min_qty: Option<Decimal>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub active_only: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(custom(function = "positive"))]
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 200), nested)]
    pub items: Vec<OrderItemRequest>,
    #[validate(custom(function = "non_negative"))]
    pub discount: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub delivery_fee: Option<Decimal>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

/// Account that receives immediate payments or collects boletos
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmOrderRequest {
    pub bank_account_id: Option<Uuid>,
}

/// A delivered order and the points it earned
#[derive(Debug, Serialize)]
pub struct DeliveredOrderResponse {
    pub order: Order,
    pub points_awarded: u64,
}
