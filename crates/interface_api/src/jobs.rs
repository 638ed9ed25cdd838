//! Background jobs
//!
//! The overdue sweep runs in-process on a fixed interval, or once per
//! invocation from the `overdue-sweep` binary when scheduled by cron.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use core_kernel::TenantId;
use domain_finance::SweepReport;
use domain_messaging::MessageTemplate;

use crate::error::ApiError;
use crate::notifications::{dispatch_due, notify_customer};
use crate::AppState;

/// Periodic overdue sweep over every active store
pub struct OverdueJob {
    state: AppState,
    interval: Duration,
}

impl OverdueJob {
    pub fn new(state: AppState, interval: Duration) -> Self {
        Self { state, interval }
    }

    /// Sweeps every active tenant at its local date, then flushes deferred messages
    ///
    /// A failing tenant is logged and skipped.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport, ApiError> {
        let state = &self.state;
        let mut total = SweepReport::default();

        for tenant in state.tenants.list_active().await? {
            let tenant_id = tenant.tenant_id();
            let today = tenant.timezone().local_date(now);
            match state
                .finance
                .run_overdue_sweep(tenant_id, today, &state.services.overdue_sweep)
                .await
            {
                Ok(report) => {
                    notify_overdue(state, tenant_id, &report, today).await;
                    total.merge(report);
                }
                Err(e) => warn!(tenant = %tenant_id, error = %e, "overdue sweep failed for tenant"),
            }
        }

        if let Err(e) = dispatch_due(state, now).await {
            warn!(error = %e, "deferred notifications not dispatched");
        }
        info!(
            boletos = total.boletos_marked.len(),
            receivables = total.receivables_marked.len(),
            skipped = total.skipped,
            "overdue job finished"
        );
        Ok(total)
    }

    /// Runs forever; the first sweep happens immediately
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once(Utc::now()).await {
                warn!(error = %e, "overdue job failed");
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        info!(interval_secs = self.interval.as_secs(), "overdue job scheduled");
        tokio::spawn(self.run())
    }
}

/// Tells each customer whose boleto just became overdue what is now owed
pub async fn notify_overdue(state: &AppState, tenant_id: TenantId, report: &SweepReport, today: NaiveDate) {
    if state.services.notifier.is_none() {
        return;
    }
    for boleto_id in &report.boletos_marked {
        let boleto = match state.finance.find_boleto(tenant_id, *boleto_id).await {
            Ok(boleto) => boleto,
            Err(e) => {
                warn!(boleto = %boleto_id, error = %e, "overdue boleto not found for notification");
                continue;
            }
        };
        let (amount, updated_amount, due_date, days_late) =
            (boleto.amount, boleto.amount_due(today), boleto.due_date, boleto.days_late(today));
        notify_customer(state, tenant_id, boleto.customer_id, move |customer| MessageTemplate::BoletoOverdue {
            customer_name: customer.name.clone(),
            amount,
            updated_amount,
            due_date,
            days_late,
        });
    }
}
