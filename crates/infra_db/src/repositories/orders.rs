//! Customers, products and orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{CustomerId, OrderId, OrderItemId, ProductId, TaxDocument, TenantId};
use domain_orders::{
    Customer, CustomerType, Order, OrderItem, OrderStatus, PaymentMethod, PriceTier, Product, Unit,
};

use super::{column, currency, money};
use crate::error::DatabaseError;

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    customer_type: String,
    document: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    credit_limit: Decimal,
    currency: String,
    referral_code: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = DatabaseError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let document = row
            .document
            .as_deref()
            .map(|d| TaxDocument::parse(d).map_err(|_| DatabaseError::invalid_value("document", d)))
            .transpose()?;
        Ok(Customer {
            id: CustomerId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            customer_type: column("customer_type", &row.customer_type, CustomerType::parse)?,
            document,
            phone: row.phone,
            email: row.email,
            credit_limit: money(row.credit_limit, currency(&row.currency)?),
            referral_code: row.referral_code,
            active: row.active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    tenant_id: Uuid,
    sku: String,
    name: String,
    unit: String,
    retail_price: Decimal,
    wholesale_price: Decimal,
    wholesale_min_qty: Decimal,
    currency: String,
    ncm: Option<String>,
    active: bool,
}

impl TryFrom<ProductRow> for Product {
    type Error = DatabaseError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            sku: row.sku,
            name: row.name,
            unit: column("unit", &row.unit, Unit::parse)?,
            retail_price: money(row.retail_price, currency),
            wholesale_price: money(row.wholesale_price, currency),
            wholesale_min_qty: row.wholesale_min_qty,
            ncm: row.ncm,
            active: row.active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    tenant_id: Uuid,
    number: String,
    customer_id: Uuid,
    customer_type: String,
    subtotal: Decimal,
    discount: Decimal,
    delivery_fee: Decimal,
    total: Decimal,
    currency: String,
    payment_method: sqlx::types::Json<PaymentMethod>,
    status: String,
    delivery_date: Option<NaiveDate>,
    notes: Option<String>,
    placed_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
    tier: String,
    discount: Decimal,
    currency: String,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = DatabaseError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        Ok(OrderItem {
            id: OrderItemId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            description: row.description,
            quantity: row.quantity,
            unit_price: money(row.unit_price, currency),
            tier: column("tier", &row.tier, PriceTier::parse)?,
            discount: money(row.discount, currency),
        })
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, DatabaseError> {
        let currency = currency(&self.currency)?;
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            tenant_id: TenantId::from_uuid(self.tenant_id),
            number: self.number,
            customer_id: CustomerId::from_uuid(self.customer_id),
            customer_type: column("customer_type", &self.customer_type, CustomerType::parse)?,
            items,
            subtotal: money(self.subtotal, currency),
            discount: money(self.discount, currency),
            delivery_fee: money(self.delivery_fee, currency),
            total: money(self.total, currency),
            payment_method: self.payment_method.0,
            status: column("status", &self.status, OrderStatus::parse)?,
            delivery_date: self.delivery_date,
            notes: self.notes,
            placed_at: self.placed_at,
            confirmed_at: self.confirmed_at,
            delivered_at: self.delivered_at,
            cancelled_at: self.cancelled_at,
            cancel_reason: self.cancel_reason,
        })
    }
}

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, customer_type, document, phone, email, \
     credit_limit, currency, referral_code, active, created_at";

const PRODUCT_COLUMNS: &str = "id, tenant_id, sku, name, unit, retail_price, wholesale_price, \
     wholesale_min_qty, currency, ncm, active";

const ORDER_COLUMNS: &str = "id, tenant_id, number, customer_id, customer_type, subtotal, discount, \
     delivery_fee, total, currency, payment_method, status, delivery_date, notes, placed_at, \
     confirmed_at, delivered_at, cancelled_at, cancel_reason";

/// Repository for the sales side: customers, catalogue and orders
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Customers
    // ------------------------------------------------------------------

    pub async fn insert_customer(&self, customer: &Customer) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, name, customer_type, document, phone, email,
                credit_limit, currency, referral_code, active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(*customer.id.as_uuid())
        .bind(*customer.tenant_id.as_uuid())
        .bind(&customer.name)
        .bind(customer.customer_type.as_str())
        .bind(customer.document.as_ref().map(|d| d.digits().to_string()))
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.credit_limit.amount())
        .bind(customer.credit_limit.currency().code())
        .bind(&customer.referral_code)
        .bind(customer.active)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;
        debug!(customer = %customer.id, "customer inserted");
        Ok(())
    }

    pub async fn update_customer(&self, customer: &Customer) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = $3, customer_type = $4, document = $5, phone = $6, email = $7,
                credit_limit = $8, referral_code = $9, active = $10
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(*customer.tenant_id.as_uuid())
        .bind(*customer.id.as_uuid())
        .bind(&customer.name)
        .bind(customer.customer_type.as_str())
        .bind(customer.document.as_ref().map(|d| d.digits().to_string()))
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.credit_limit.amount())
        .bind(&customer.referral_code)
        .bind(customer.active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Customer", customer.id));
        }
        Ok(())
    }

    pub async fn find_customer(&self, tenant_id: TenantId, id: CustomerId) -> Result<Customer, DatabaseError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Customer", id))?
            .try_into()
    }

    /// Finds the customer that owns a referral code
    pub async fn find_customer_by_referral_code(
        &self,
        tenant_id: TenantId,
        code: &str,
    ) -> Result<Customer, DatabaseError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant_id = $1 AND referral_code = $2"
        );
        sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(code.to_ascii_uppercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Customer", code))?
            .try_into()
    }

    pub async fn list_customers(&self, tenant_id: TenantId, limit: i64) -> Result<Vec<Customer>, DatabaseError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE tenant_id = $1 ORDER BY name LIMIT $2"
        );
        sqlx::query_as::<_, CustomerRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Customer::try_from)
            .collect()
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    pub async fn insert_product(&self, product: &Product) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, sku, name, unit, retail_price, wholesale_price,
                wholesale_min_qty, currency, ncm, active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(*product.tenant_id.as_uuid())
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.unit.as_str())
        .bind(product.retail_price.amount())
        .bind(product.wholesale_price.amount())
        .bind(product.wholesale_min_qty)
        .bind(product.retail_price.currency().code())
        .bind(&product.ncm)
        .bind(product.active)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Product", "sku", &product.sku),
            other => other,
        })?;
        Ok(())
    }

    pub async fn update_product(&self, product: &Product) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = $3, unit = $4, retail_price = $5, wholesale_price = $6,
                wholesale_min_qty = $7, ncm = $8, active = $9
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(*product.tenant_id.as_uuid())
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(product.unit.as_str())
        .bind(product.retail_price.amount())
        .bind(product.wholesale_price.amount())
        .bind(product.wholesale_min_qty)
        .bind(&product.ncm)
        .bind(product.active)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Product", product.id));
        }
        Ok(())
    }

    pub async fn find_product(&self, tenant_id: TenantId, id: ProductId) -> Result<Product, DatabaseError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Product", id))?
            .try_into()
    }

    /// Loads several products; fails when any of them is missing
    pub async fn find_products(&self, tenant_id: TenantId, ids: &[ProductId]) -> Result<Vec<Product>, DatabaseError> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND id = ANY($2)");
        let products = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(missing) = ids.iter().find(|id| !products.iter().any(|p| &p.id == *id)) {
            return Err(DatabaseError::not_found("Product", missing));
        }
        Ok(products)
    }

    pub async fn list_products(&self, tenant_id: TenantId, active_only: bool) -> Result<Vec<Product>, DatabaseError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = $1 AND (active OR NOT $2) ORDER BY name"
        );
        sqlx::query_as::<_, ProductRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Inserts an order and its items in one transaction
    #[instrument(skip(self, order), fields(order = %order.id))]
    pub async fn insert_order(&self, order: &Order) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tenant_id, number, customer_id, customer_type, subtotal, discount,
                delivery_fee, total, currency, payment_method, status, delivery_date, notes,
                placed_at, confirmed_at, delivered_at, cancelled_at, cancel_reason
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(*order.id.as_uuid())
        .bind(*order.tenant_id.as_uuid())
        .bind(&order.number)
        .bind(*order.customer_id.as_uuid())
        .bind(order.customer_type.as_str())
        .bind(order.subtotal.amount())
        .bind(order.discount.amount())
        .bind(order.delivery_fee.amount())
        .bind(order.total.amount())
        .bind(order.total.currency().code())
        .bind(sqlx::types::Json(&order.payment_method))
        .bind(order.status.as_str())
        .bind(order.delivery_date)
        .bind(&order.notes)
        .bind(order.placed_at)
        .bind(order.confirmed_at)
        .bind(order.delivered_at)
        .bind(order.cancelled_at)
        .bind(&order.cancel_reason)
        .execute(&mut *tx)
        .await?;

        replace_items(&mut *tx, order).await?;
        tx.commit().await?;
        debug!(items = order.items.len(), "order inserted");
        Ok(())
    }

    /// Writes back header and items of an existing order
    pub async fn update_order(&self, order: &Order) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        update_order_in(&mut *tx, order).await?;
        replace_items(&mut *tx, order).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn find_order(&self, tenant_id: TenantId, id: OrderId) -> Result<Order, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        find_order_in(&mut *conn, tenant_id, id, false).await
    }

    /// Orders of a tenant, newest first, optionally filtered by status
    pub async fn list_orders(
        &self,
        tenant_id: TenantId,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY placed_at DESC
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT id, order_id, product_id, description, quantity, unit_price, tier, discount, currency
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let (mine, rest): (Vec<_>, Vec<_>) = items.drain(..).partition(|i| i.order_id == row.id);
                items = rest;
                let mine = mine.into_iter().map(OrderItem::try_from).collect::<Result<Vec<_>, _>>()?;
                row.into_order(mine)
            })
            .collect()
    }

    /// Number of orders a customer has had delivered
    pub async fn delivered_order_count(&self, tenant_id: TenantId, customer_id: CustomerId) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE tenant_id = $1 AND customer_id = $2 AND status = 'DELIVERED'",
        )
        .bind(*tenant_id.as_uuid())
        .bind(*customer_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Loads an order and its items, optionally locking the order row
pub(crate) async fn find_order_in(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    id: OrderId,
    for_update: bool,
) -> Result<Order, DatabaseError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE tenant_id = $1 AND id = $2 {lock}");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Order", id))?;

    let items = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT id, order_id, product_id, description, quantity, unit_price, tier, discount, currency
        FROM order_items
        WHERE order_id = $1
        ORDER BY position
        "#,
    )
    .bind(row.id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(OrderItem::try_from)
    .collect::<Result<Vec<_>, _>>()?;

    row.into_order(items)
}

/// Writes the order header; items are left untouched
pub(crate) async fn update_order_in(conn: &mut PgConnection, order: &Order) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            subtotal = $3, discount = $4, delivery_fee = $5, total = $6, payment_method = $7,
            status = $8, delivery_date = $9, notes = $10, confirmed_at = $11,
            delivered_at = $12, cancelled_at = $13, cancel_reason = $14
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*order.tenant_id.as_uuid())
    .bind(*order.id.as_uuid())
    .bind(order.subtotal.amount())
    .bind(order.discount.amount())
    .bind(order.delivery_fee.amount())
    .bind(order.total.amount())
    .bind(sqlx::types::Json(&order.payment_method))
    .bind(order.status.as_str())
    .bind(order.delivery_date)
    .bind(&order.notes)
    .bind(order.confirmed_at)
    .bind(order.delivered_at)
    .bind(order.cancelled_at)
    .bind(&order.cancel_reason)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Order", order.id));
    }
    Ok(())
}

async fn replace_items(conn: &mut PgConnection, order: &Order) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(*order.id.as_uuid())
        .execute(&mut *conn)
        .await?;

    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, tenant_id, order_id, position, product_id, description,
                quantity, unit_price, tier, discount, currency
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*item.id.as_uuid())
        .bind(*order.tenant_id.as_uuid())
        .bind(*order.id.as_uuid())
        .bind(position as i32)
        .bind(*item.product_id.as_uuid())
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price.amount())
        .bind(item.tier.as_str())
        .bind(item.discount.amount())
        .bind(item.unit_price.currency().code())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}
