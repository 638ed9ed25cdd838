//! HTTP API Layer
//!
//! This crate provides the REST API of the atacarejo back office using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers per area (sales, finance, HR, loyalty, fiscal, WhatsApp)
//! - **Middleware**: JWT authentication into a `TenantContext`, audit logging
//! - **DTOs**: Validated request bodies and query strings
//! - **Jobs**: The background overdue sweep
//! - **Error Handling**: Domain and database errors mapped to JSON responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::new(pool, config)?;
//! axum::serve(listener, create_router(state)).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod notifications;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::{BusinessCalendar, HealthCheckable, PortError, TenantId};
use domain_finance::{BoletoIssuer, ClosingBuilder, OverdueSweep};
use domain_fiscal::{FiscalAuthorizer, HomologationAuthorizer};
use domain_hr::PayrollTables;
use domain_loyalty::LoyaltyProgram;
use domain_messaging::{EvolutionApiAdapter, EvolutionConfig, MessagingPort, Notifier, QuietHours, Templates};
use domain_orders::BusinessRules;
use infra_db::{
    FinanceRepository, FiscalRepository, HrRepository, LoyaltyRepository, MessagingRepository, OrderRepository,
    PostgresHealthAdapter, TenantRecord, TenantRepository,
};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::handlers::{customers, finance, fiscal, health, hr, investments, loyalty, orders, receivables, whatsapp};
use crate::middleware::{audit_middleware, auth_middleware};

/// Business policies shared by every request
pub struct Services {
    pub boleto_issuer: BoletoIssuer,
    pub overdue_sweep: OverdueSweep,
    pub closing_builder: ClosingBuilder,
    pub loyalty_program: LoyaltyProgram,
    pub payroll_tables: PayrollTables,
    pub fiscal_authorizer: Arc<dyn FiscalAuthorizer>,
    /// Absent while the WhatsApp gateway is not configured
    pub notifier: Option<Notifier>,
    pub messaging_port: Option<Arc<dyn MessagingPort>>,
    /// Probes run by the readiness check, besides the messaging port
    pub health_checks: Vec<Arc<dyn HealthCheckable>>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: ApiConfig,
    pub tenants: TenantRepository,
    pub orders: OrderRepository,
    pub finance: FinanceRepository,
    pub hr: HrRepository,
    pub loyalty: LoyaltyRepository,
    pub fiscal: FiscalRepository,
    pub messages: MessagingRepository,
    pub services: Arc<Services>,
}

impl AppState {
    /// Wires repositories and policies; connects the WhatsApp gateway when configured
    pub fn new(pool: PgPool, config: ApiConfig) -> Result<Self, PortError> {
        let port: Option<Arc<dyn MessagingPort>> = if config.whatsapp_enabled() {
            let adapter = EvolutionApiAdapter::new(EvolutionConfig {
                base_url: config.evolution_base_url.clone(),
                api_key: config.evolution_api_key.clone(),
                instance: config.evolution_instance.clone(),
                ..EvolutionConfig::default()
            })?;
            Some(Arc::new(adapter))
        } else {
            None
        };
        Self::with_ports(pool, config, Arc::new(HomologationAuthorizer::new()), port)
    }

    /// Wires the state around explicit fiscal and messaging ports
    pub fn with_ports(
        pool: PgPool,
        config: ApiConfig,
        fiscal_authorizer: Arc<dyn FiscalAuthorizer>,
        messaging_port: Option<Arc<dyn MessagingPort>>,
    ) -> Result<Self, PortError> {
        let finance = FinanceRepository::new(pool.clone()).with_overdraft(config.allow_overdraft);

        let health_checks: Vec<Arc<dyn HealthCheckable>> = vec![Arc::new(PostgresHealthAdapter::new(pool.clone()))];
        let notifier = match &messaging_port {
            Some(port) => {
                let templates = Templates::pt_br().map_err(|e| PortError::internal(e.to_string()))?;
                Some(Notifier::new(
                    port.clone(),
                    Arc::new(templates),
                    QuietHours {
                        timezone: config.timezone(),
                        ..QuietHours::default()
                    },
                    config.evolution_instance.clone(),
                ))
            }
            None => None,
        };

        let services = Services {
            boleto_issuer: BoletoIssuer::default(),
            overdue_sweep: OverdueSweep::new(config.overdue_grace_days),
            closing_builder: ClosingBuilder::strict(),
            loyalty_program: LoyaltyProgram::default(),
            payroll_tables: PayrollTables::brazil_2024(),
            fiscal_authorizer,
            notifier,
            messaging_port,
            health_checks,
        };

        Ok(Self {
            tenants: TenantRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            hr: HrRepository::new(pool.clone()).with_finance(finance.clone()),
            finance,
            loyalty: LoyaltyRepository::new(pool.clone()),
            fiscal: FiscalRepository::new(pool.clone()),
            messages: MessagingRepository::new(pool.clone()),
            services: Arc::new(services),
            pool,
            config,
        })
    }

    /// Loads a tenant with the order rules of its local timezone
    pub async fn tenant_rules(&self, tenant_id: TenantId) -> Result<(TenantRecord, BusinessRules), ApiError> {
        let tenant = self.tenants.get(tenant_id).await?;
        let rules = BusinessRules::new(BusinessCalendar::new(tenant.timezone()));
        Ok((tenant, rules))
    }
}

/// Creates the main API router
///
/// Everything under `/api/v1` requires a bearer token; health endpoints and the
/// WhatsApp webhook (checked against its shared key) are public.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/webhooks/whatsapp", post(whatsapp::receive_webhook));

    let customer_routes = Router::new()
        .route("/", post(customers::create_customer).get(customers::list_customers))
        .route("/:id", get(customers::get_customer).put(customers::update_customer));

    let product_routes = Router::new()
        .route("/", post(customers::create_product).get(customers::list_products))
        .route("/:id", get(customers::get_product).put(customers::update_product));

    let order_routes = Router::new()
        .route("/", post(orders::create_order).get(orders::list_orders))
        .route("/:id", get(orders::get_order))
        .route("/:id/confirm", post(orders::confirm_order))
        .route("/:id/prepare", post(orders::prepare_order))
        .route("/:id/dispatch", post(orders::dispatch_order))
        .route("/:id/deliver", post(orders::deliver_order))
        .route("/:id/cancel", post(orders::cancel_order));

    let receivable_routes = Router::new()
        .route("/", get(receivables::list_receivables))
        .route("/:id", get(receivables::get_receivable))
        .route("/:id/payments", post(receivables::register_payment))
        .route("/:id/cancel", post(receivables::cancel_receivable))
        .route("/:id/boletos", post(receivables::issue_boleto));

    let boleto_routes = Router::new()
        .route("/", get(receivables::list_boletos))
        .route("/overdue-sweep", post(receivables::run_overdue_sweep))
        .route("/:id", get(receivables::get_boleto))
        .route("/:id/pay", post(receivables::pay_boleto))
        .route("/:id/cancel", post(receivables::cancel_boleto))
        .route("/:id/reverse", post(receivables::reverse_boleto_payment));

    let bank_account_routes = Router::new()
        .route("/", post(finance::create_bank_account).get(finance::list_bank_accounts))
        .route("/transfers", post(finance::transfer))
        .route("/:id", get(finance::get_bank_account));

    let entry_routes = Router::new()
        .route("/", post(finance::create_entry).get(finance::list_entries))
        .route("/:id", get(finance::get_entry))
        .route("/:id/settle", post(finance::settle_entry))
        .route("/:id/cancel", post(finance::cancel_entry))
        .route("/:id/reverse", post(finance::reverse_entry));

    let closing_routes = Router::new()
        .route("/", post(finance::close_period).get(finance::list_closings))
        .route("/:id", get(finance::get_closing))
        .route("/:id/reopen", post(finance::reopen_closing));

    let employee_routes = Router::new()
        .route("/", post(hr::create_employee).get(hr::list_employees))
        .route("/:id", get(hr::get_employee))
        .route("/:id/terminate", post(hr::terminate_employee));

    let payroll_routes = Router::new()
        .route("/", post(hr::prepare_payroll).get(hr::list_payrolls))
        .route("/:id", get(hr::get_payroll))
        .route("/:id/approve", post(hr::approve_payroll))
        .route("/:id/pay", post(hr::pay_payroll));

    let loyalty_routes = Router::new()
        .route("/accounts", get(loyalty::list_accounts))
        .route("/customers/:customer_id", get(loyalty::get_account))
        .route("/customers/:customer_id/redeem", post(loyalty::redeem));

    let referral_routes = Router::new()
        .route("/", post(loyalty::register_referral).get(loyalty::list_referrals))
        .route("/expire", post(loyalty::expire_referrals))
        .route("/:id", get(loyalty::get_referral));

    let fiscal_routes = Router::new()
        .route("/", post(fiscal::issue_invoice).get(fiscal::list_invoices))
        .route("/:id", get(fiscal::get_invoice))
        .route("/:id/authorize", post(fiscal::authorize_invoice))
        .route("/:id/cancel", post(fiscal::cancel_invoice));

    let whatsapp_routes = Router::new().route("/messages", post(whatsapp::send_message).get(whatsapp::list_messages));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .nest("/products", product_routes)
        .nest("/orders", order_routes)
        .nest("/receivables", receivable_routes)
        .nest("/boletos", boleto_routes)
        .nest("/bank-accounts", bank_account_routes)
        .nest("/entries", entry_routes)
        .nest("/closings", closing_routes)
        .route("/reports/dre", get(finance::dre_report))
        .nest("/employees", employee_routes)
        .nest("/payroll-runs", payroll_routes)
        .nest("/loyalty", loyalty_routes)
        .nest("/referrals", referral_routes)
        .route("/investments/simulate", post(investments::simulate))
        .nest("/fiscal/invoices", fiscal_routes)
        .nest("/whatsapp", whatsapp_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
