//! Finance repository
//!
//! Besides plain reads and inserts, this module runs the flows that move
//! money. Each one opens a transaction, locks the rows it touches, rebuilds
//! the slice of the tenant's [`Ledger`] it needs, applies the domain
//! operation and writes entries and balances back before committing. A bank
//! balance therefore never changes without the entry that explains it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    BankAccountId, BoletoId, ClosingId, CustomerId, DateRange, FinancialEntryId, Money, OrderId,
    Rate, ReceivableId, TenantId, Timezone, UserId,
};
use domain_finance::{
    AccountSummary, BankAccount, BankAccountKind, Boleto, BoletoIssuer, BoletoPayment, BoletoStatus,
    ClosingBuilder, ClosingStatus, EntryCategory, EntryKind, EntryStatus, FinanceError,
    FinancialClosing, FinancialEntry, Ledger, OverdueSweep, Receivable, ReceivableStatus, SweepReport,
};
use domain_orders::{BusinessRules, Order};

use super::orders::{find_order_in, update_order_in};
use super::tenant::TenantRecord;
use super::{column, currency, money, to_u32};
use crate::error::DatabaseError;

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct BankAccountRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    bank_code: String,
    agency: String,
    number: String,
    kind: String,
    balance: Decimal,
    currency: String,
    active: bool,
}

impl TryFrom<BankAccountRow> for BankAccount {
    type Error = DatabaseError;

    fn try_from(row: BankAccountRow) -> Result<Self, Self::Error> {
        Ok(BankAccount {
            id: BankAccountId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            name: row.name,
            bank_code: row.bank_code,
            agency: row.agency,
            number: row.number,
            kind: column("kind", &row.kind, BankAccountKind::parse)?,
            balance: money(row.balance, currency(&row.currency)?),
            active: row.active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    tenant_id: Uuid,
    bank_account_id: Uuid,
    kind: String,
    category: String,
    description: String,
    amount: Decimal,
    currency: String,
    competence_date: NaiveDate,
    due_date: Option<NaiveDate>,
    settled_at: Option<DateTime<Utc>>,
    status: String,
    reference_type: Option<String>,
    reference_id: Option<Uuid>,
    transfer_pair: Option<Uuid>,
    reversal_of: Option<Uuid>,
    reversed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for FinancialEntry {
    type Error = DatabaseError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(FinancialEntry {
            id: FinancialEntryId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            bank_account_id: BankAccountId::from_uuid(row.bank_account_id),
            kind: column("kind", &row.kind, EntryKind::parse)?,
            category: column("category", &row.category, EntryCategory::parse)?,
            description: row.description,
            amount: money(row.amount, currency(&row.currency)?),
            competence_date: row.competence_date,
            due_date: row.due_date,
            settled_at: row.settled_at,
            status: column("status", &row.status, EntryStatus::parse)?,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            transfer_pair: row.transfer_pair.map(FinancialEntryId::from_uuid),
            reversal_of: row.reversal_of.map(FinancialEntryId::from_uuid),
            reversed_by: row.reversed_by.map(FinancialEntryId::from_uuid),
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReceivableRow {
    id: Uuid,
    tenant_id: Uuid,
    customer_id: Uuid,
    order_id: Option<Uuid>,
    installment: i32,
    description: String,
    amount: Decimal,
    amount_paid: Decimal,
    charges_paid: Decimal,
    currency: String,
    due_date: NaiveDate,
    status: String,
    paid_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReceivableRow> for Receivable {
    type Error = DatabaseError;

    fn try_from(row: ReceivableRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        Ok(Receivable {
            id: ReceivableId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            order_id: row.order_id.map(OrderId::from_uuid),
            installment: to_u32("installment", row.installment)?,
            description: row.description,
            amount: money(row.amount, currency),
            amount_paid: money(row.amount_paid, currency),
            charges_paid: money(row.charges_paid, currency),
            due_date: row.due_date,
            status: column("status", &row.status, ReceivableStatus::parse)?,
            paid_at: row.paid_at,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BoletoRow {
    id: Uuid,
    tenant_id: Uuid,
    receivable_id: Uuid,
    customer_id: Uuid,
    bank_account_id: Uuid,
    our_number: String,
    digitable_line: String,
    barcode: String,
    amount: Decimal,
    currency: String,
    due_date: NaiveDate,
    status: String,
    fine_rate: Decimal,
    monthly_interest_rate: Decimal,
    paid_amount: Option<Decimal>,
    paid_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    issued_at: DateTime<Utc>,
}

impl TryFrom<BoletoRow> for Boleto {
    type Error = DatabaseError;

    fn try_from(row: BoletoRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        Ok(Boleto {
            id: BoletoId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            receivable_id: ReceivableId::from_uuid(row.receivable_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            bank_account_id: BankAccountId::from_uuid(row.bank_account_id),
            our_number: row.our_number,
            digitable_line: row.digitable_line,
            barcode: row.barcode,
            amount: money(row.amount, currency),
            due_date: row.due_date,
            status: column("status", &row.status, BoletoStatus::parse)?,
            fine_rate: Rate::new(row.fine_rate),
            monthly_interest_rate: Rate::new(row.monthly_interest_rate),
            paid_amount: row.paid_amount.map(|a| money(a, currency)),
            paid_at: row.paid_at,
            cancelled_at: row.cancelled_at,
            cancel_reason: row.cancel_reason,
            issued_at: row.issued_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClosingRow {
    id: Uuid,
    tenant_id: Uuid,
    period_start: NaiveDate,
    period_end: NaiveDate,
    accounts: sqlx::types::Json<Vec<AccountSummary>>,
    total_income: Decimal,
    total_expense: Decimal,
    net_result: Decimal,
    currency: String,
    status: String,
    closed_by: Option<Uuid>,
    closed_at: Option<DateTime<Utc>>,
    reopened_by: Option<Uuid>,
    reopened_at: Option<DateTime<Utc>>,
}

impl TryFrom<ClosingRow> for FinancialClosing {
    type Error = DatabaseError;

    fn try_from(row: ClosingRow) -> Result<Self, Self::Error> {
        let currency = currency(&row.currency)?;
        let period = DateRange::new(row.period_start, row.period_end)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        Ok(FinancialClosing {
            id: ClosingId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            period,
            accounts: row.accounts.0,
            total_income: money(row.total_income, currency),
            total_expense: money(row.total_expense, currency),
            net_result: money(row.net_result, currency),
            status: column("status", &row.status, ClosingStatus::parse)?,
            closed_by: row.closed_by.map(UserId::from_uuid),
            closed_at: row.closed_at,
            reopened_by: row.reopened_by.map(UserId::from_uuid),
            reopened_at: row.reopened_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, tenant_id, name, bank_code, agency, number, kind, balance, currency, active";

const ENTRY_COLUMNS: &str = "id, tenant_id, bank_account_id, kind, category, description, amount, \
     currency, competence_date, due_date, settled_at, status, reference_type, reference_id, \
     transfer_pair, reversal_of, reversed_by, created_at";

const RECEIVABLE_COLUMNS: &str = "id, tenant_id, customer_id, order_id, installment, description, \
     amount, amount_paid, charges_paid, currency, due_date, status, paid_at, cancel_reason, created_at";

const BOLETO_COLUMNS: &str = "id, tenant_id, receivable_id, customer_id, bank_account_id, our_number, \
     digitable_line, barcode, amount, currency, due_date, status, fine_rate, monthly_interest_rate, \
     paid_amount, paid_at, cancelled_at, cancel_reason, issued_at";

const CLOSING_COLUMNS: &str = "id, tenant_id, period_start, period_end, accounts, total_income, \
     total_expense, net_result, currency, status, closed_by, closed_at, reopened_by, reopened_at";

// ============================================================================
// Outcomes
// ============================================================================

/// What confirming an order produced
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedReceivables {
    pub order: Order,
    pub receivables: Vec<Receivable>,
    pub boletos: Vec<Boleto>,
    /// Income settled at confirmation for cash, Pix and card sales
    pub entries: Vec<FinancialEntry>,
}

// ============================================================================
// Repository
// ============================================================================

/// Repository for bank accounts, ledger entries, receivables, boletos and closings
#[derive(Debug, Clone)]
pub struct FinanceRepository {
    pool: PgPool,
    allow_overdraft: bool,
}

impl FinanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            allow_overdraft: false,
        }
    }

    /// Lets checking and provider accounts go negative in ledger flows
    pub fn with_overdraft(mut self, allow: bool) -> Self {
        self.allow_overdraft = allow;
        self
    }

    // ------------------------------------------------------------------
    // Bank accounts
    // ------------------------------------------------------------------

    pub async fn insert_bank_account(&self, account: &BankAccount) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO bank_accounts (
                id, tenant_id, name, bank_code, agency, number, kind, balance, currency, active
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*account.id.as_uuid())
        .bind(*account.tenant_id.as_uuid())
        .bind(&account.name)
        .bind(&account.bank_code)
        .bind(&account.agency)
        .bind(&account.number)
        .bind(account.kind.as_str())
        .bind(account.balance.amount())
        .bind(account.currency().code())
        .bind(account.active)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Bank account", "name", &account.name),
            other => other,
        })?;
        info!(account = %account.id, kind = account.kind.as_str(), "bank account created");
        Ok(())
    }

    pub async fn find_bank_account(&self, tenant_id: TenantId, id: BankAccountId) -> Result<BankAccount, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, BankAccountRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Bank account", id))?
            .try_into()
    }

    pub async fn list_bank_accounts(&self, tenant_id: TenantId) -> Result<Vec<BankAccount>, DatabaseError> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE tenant_id = $1 ORDER BY name");
        sqlx::query_as::<_, BankAccountRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(BankAccount::try_from)
            .collect()
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    pub async fn find_entry(&self, tenant_id: TenantId, id: FinancialEntryId) -> Result<FinancialEntry, DatabaseError> {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM financial_entries WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, EntryRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Financial entry", id))?
            .try_into()
    }

    /// Entries whose competence date falls inside the period, optionally for one account
    pub async fn entries_for_period(
        &self,
        tenant_id: TenantId,
        period: &DateRange,
        account: Option<BankAccountId>,
    ) -> Result<Vec<FinancialEntry>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM financial_entries
            WHERE tenant_id = $1
              AND competence_date BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR bank_account_id = $4)
            ORDER BY competence_date, created_at
            "#
        );
        sqlx::query_as::<_, EntryRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(period.start)
            .bind(period.end)
            .bind(account.map(|a| *a.as_uuid()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(FinancialEntry::try_from)
            .collect()
    }

    /// Records an entry, settling it immediately when `settle_at` is given
    #[instrument(skip(self, entry), fields(entry = %entry.id, kind = entry.kind.as_str()))]
    pub async fn record_entry(
        &self,
        entry: FinancialEntry,
        settle_at: Option<DateTime<Utc>>,
    ) -> Result<FinancialEntry, DatabaseError> {
        let tenant_id = entry.tenant_id;
        let mut tx = self.pool.begin().await?;
        let mut ledger = self.open_ledger(&mut *tx, tenant_id, &[entry.bank_account_id]).await?;

        let id = match settle_at {
            Some(at) => ledger.record_settled(entry, at)?,
            None => ledger.record(entry)?,
        };
        persist_ledger(&mut *tx, &ledger).await?;
        tx.commit().await?;
        ledger
            .entry(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Financial entry", id))
    }

    /// Settles a pending entry and moves its account balance
    #[instrument(skip(self))]
    pub async fn settle_entry(
        &self,
        tenant_id: TenantId,
        id: FinancialEntryId,
        at: DateTime<Utc>,
    ) -> Result<FinancialEntry, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let entry = lock_entry(&mut *tx, tenant_id, id).await?;
        let mut ledger = self.open_ledger(&mut *tx, tenant_id, &[entry.bank_account_id]).await?;
        ledger.restore(entry)?;
        ledger.settle(&id, at)?;
        persist_ledger(&mut *tx, &ledger).await?;
        tx.commit().await?;
        ledger
            .entry(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Financial entry", id))
    }

    /// Cancels a pending entry
    pub async fn cancel_entry(&self, tenant_id: TenantId, id: FinancialEntryId) -> Result<FinancialEntry, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let entry = lock_entry(&mut *tx, tenant_id, id).await?;
        let mut ledger = self.open_ledger(&mut *tx, tenant_id, &[entry.bank_account_id]).await?;
        ledger.restore(entry)?;
        ledger.cancel(&id)?;
        persist_ledger(&mut *tx, &ledger).await?;
        tx.commit().await?;
        ledger
            .entry(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Financial entry", id))
    }

    /// Reverses a settled entry by posting its opposite; returns the reversal
    #[instrument(skip(self))]
    pub async fn reverse_entry(
        &self,
        tenant_id: TenantId,
        id: FinancialEntryId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<FinancialEntry, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let entry = lock_entry(&mut *tx, tenant_id, id).await?;
        let mut ledger = self.open_ledger(&mut *tx, tenant_id, &[entry.bank_account_id]).await?;
        ledger.restore(entry)?;
        let reversal_id = ledger.reverse(&id, reason, at)?;
        persist_ledger(&mut *tx, &ledger).await?;
        tx.commit().await?;
        ledger
            .entry(&reversal_id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Financial entry", reversal_id))
    }

    /// Moves money between two accounts as a settled TransferOut/TransferIn pair
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        tenant_id: TenantId,
        from: BankAccountId,
        to: BankAccountId,
        amount: Money,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> Result<(FinancialEntry, FinancialEntry), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut ledger = self.open_ledger(&mut *tx, tenant_id, &[from, to]).await?;
        let (out_id, in_id) = ledger.transfer(from, to, amount, date, at)?;
        persist_ledger(&mut *tx, &ledger).await?;
        tx.commit().await?;

        let out = ledger.entry(&out_id).cloned().ok_or_else(|| DatabaseError::not_found("Financial entry", out_id))?;
        let incoming = ledger.entry(&in_id).cloned().ok_or_else(|| DatabaseError::not_found("Financial entry", in_id))?;
        info!(from = %from, to = %to, amount = %amount, "transfer recorded");
        Ok((out, incoming))
    }

    /// Settles a batch of entries produced elsewhere (payroll, purchases)
    pub async fn record_settled_batch(
        &self,
        tenant_id: TenantId,
        entries: Vec<FinancialEntry>,
        at: DateTime<Utc>,
    ) -> Result<Vec<FinancialEntry>, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let recorded = self.record_settled_in(&mut *tx, tenant_id, entries, at).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    /// Records and settles entries inside a caller's transaction
    pub(crate) async fn record_settled_in(
        &self,
        conn: &mut PgConnection,
        tenant_id: TenantId,
        entries: Vec<FinancialEntry>,
        at: DateTime<Utc>,
    ) -> Result<Vec<FinancialEntry>, DatabaseError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let mut account_ids: Vec<BankAccountId> = entries.iter().map(|e| e.bank_account_id).collect();
        account_ids.sort_by_key(|id| *id.as_uuid());
        account_ids.dedup();

        let mut ledger = self.open_ledger(conn, tenant_id, &account_ids).await?;
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(ledger.record_settled(entry, at)?);
        }
        persist_ledger(conn, &ledger).await?;
        Ok(ids.iter().filter_map(|id| ledger.entry(id).cloned()).collect())
    }

    // ------------------------------------------------------------------
    // Receivables
    // ------------------------------------------------------------------

    pub async fn find_receivable(&self, tenant_id: TenantId, id: ReceivableId) -> Result<Receivable, DatabaseError> {
        let sql = format!("SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Receivable", id))?
            .try_into()
    }

    pub async fn list_receivables(
        &self,
        tenant_id: TenantId,
        status: Option<ReceivableStatus>,
        customer: Option<CustomerId>,
    ) -> Result<Vec<Receivable>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {RECEIVABLE_COLUMNS} FROM receivables
            WHERE tenant_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
            ORDER BY due_date, installment
            "#
        );
        sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .bind(customer.map(|c| *c.as_uuid()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Receivable::try_from)
            .collect()
    }

    pub async fn insert_receivable(&self, receivable: &Receivable) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert_receivable_in(&mut conn, receivable).await
    }

    /// Principal still owed by a customer across open receivables
    pub async fn open_balance(&self, tenant_id: TenantId, customer_id: CustomerId) -> Result<Money, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        open_balance_in(&mut conn, tenant_id, customer_id).await
    }

    /// Registers money received for a receivable without a boleto (store credit)
    #[instrument(skip(self))]
    pub async fn register_receivable_payment(
        &self,
        tenant_id: TenantId,
        id: ReceivableId,
        account: BankAccountId,
        amount: Money,
        charges: Money,
        paid_at: DateTime<Utc>,
        timezone: &Timezone,
    ) -> Result<Receivable, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut receivable = lock_receivable(&mut *tx, tenant_id, id).await?;
        let open_boletos: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM boletos WHERE receivable_id = $1 AND status IN ('PENDING', 'OVERDUE')",
        )
        .bind(*id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        if open_boletos > 0 {
            return Err(FinanceError::InvalidOperation(format!(
                "receivable {id} has an open boleto; register the boleto payment instead"
            ))
            .into());
        }

        receivable.register_payment(amount, charges, paid_at)?;
        let paid_on = timezone.local_date(paid_at);
        let principal = amount.checked_sub(&charges).map_err(FinanceError::from)?;
        let reference = *id.as_uuid();
        let mut entries = vec![FinancialEntry::income(
            tenant_id,
            account,
            EntryCategory::Sales,
            receivable.description.clone(),
            principal,
            paid_on,
        )?
        .with_reference("receivable", reference)];
        if charges.is_positive() {
            entries.push(
                FinancialEntry::income(
                    tenant_id,
                    account,
                    EntryCategory::LateFees,
                    format!("Encargos: {}", receivable.description),
                    charges,
                    paid_on,
                )?
                .with_reference("receivable", reference),
            );
        }
        self.record_settled_in(&mut *tx, tenant_id, entries, paid_at).await?;
        update_receivable_in(&mut *tx, &receivable).await?;
        tx.commit().await?;
        Ok(receivable)
    }

    /// Cancels an unpaid receivable together with its open boletos
    pub async fn cancel_receivable(
        &self,
        tenant_id: TenantId,
        id: ReceivableId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Receivable, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut receivable = lock_receivable(&mut *tx, tenant_id, id).await?;
        receivable.cancel(reason)?;
        for mut boleto in boletos_of_receivable(&mut *tx, tenant_id, id).await? {
            if boleto.status.is_open() {
                boleto.cancel(reason, at)?;
                update_boleto_in(&mut *tx, &boleto).await?;
            }
        }
        update_receivable_in(&mut *tx, &receivable).await?;
        tx.commit().await?;
        Ok(receivable)
    }

    // ------------------------------------------------------------------
    // Order confirmation
    // ------------------------------------------------------------------

    /// Confirms an order and creates what it is paid with, in one transaction
    ///
    /// - Boleto sales get one receivable and one boleto per installment,
    ///   collected into `account`
    /// - Store-credit sales get a single receivable
    /// - Cash, Pix and card sales settle Sales income into `account`
    ///
    /// Credit sales are checked against the customer's limit first.
    #[instrument(skip(self, rules, issuer))]
    pub async fn confirm_order_receivables(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        rules: &BusinessRules,
        issuer: &BoletoIssuer,
        account: Option<BankAccountId>,
        now: DateTime<Utc>,
    ) -> Result<ConfirmedReceivables, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut order = find_order_in(&mut *tx, tenant_id, order_id, true).await?;
        order.confirm(now, rules)?;

        let issue_date = rules.today(now);
        let installments = order.installment_plan(issue_date, &rules.calendar)?;
        let mut receivables = Vec::new();
        let mut boletos = Vec::new();
        let mut entries = Vec::new();

        if order.payment_method.is_credit() {
            let limit: (Decimal, String, bool) = sqlx::query_as(
                "SELECT credit_limit, currency, active FROM customers WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
            )
            .bind(*tenant_id.as_uuid())
            .bind(*order.customer_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Customer", order.customer_id))?;
            let open = open_balance_in(&mut *tx, tenant_id, order.customer_id).await?;
            check_credit(limit, open, order.total)?;

            for installment in &installments {
                let receivable = Receivable::new(
                    tenant_id,
                    order.customer_id,
                    format!("Pedido {} ({}/{})", order.number, installment.number, installments.len()),
                    installment.amount,
                    installment.due_date,
                )?
                .for_order(order.id, installment.number);
                insert_receivable_in(&mut *tx, &receivable).await?;
                receivables.push(receivable);
            }

            if matches!(order.payment_method, domain_orders::PaymentMethod::Boleto { .. }) {
                let account_id = account.ok_or_else(|| {
                    FinanceError::InvalidOperation("boleto sales need a collecting account".to_string())
                })?;
                for receivable in &receivables {
                    let (bank_account, our_number) = next_our_number(&mut *tx, tenant_id, account_id).await?;
                    let boleto = issuer.issue(receivable, &bank_account, our_number, now)?;
                    insert_boleto_in(&mut *tx, &boleto).await?;
                    boletos.push(boleto);
                }
            }
        } else {
            let account_id = account.ok_or_else(|| {
                FinanceError::InvalidOperation("immediate sales need a receiving account".to_string())
            })?;
            let income = FinancialEntry::income(
                tenant_id,
                account_id,
                EntryCategory::Sales,
                format!("Pedido {}", order.number),
                order.total,
                issue_date,
            )?
            .with_reference("order", *order.id.as_uuid());
            entries.extend(self.record_settled_in(&mut *tx, tenant_id, vec![income], now).await?);
        }

        update_order_in(&mut *tx, &order).await?;
        tx.commit().await?;
        info!(
            order = %order.id,
            receivables = receivables.len(),
            boletos = boletos.len(),
            "order confirmed"
        );
        Ok(ConfirmedReceivables {
            order,
            receivables,
            boletos,
            entries,
        })
    }

    /// Cancels an order and undoes what its confirmation created
    ///
    /// Unpaid receivables and their open boletos are cancelled, settled sale
    /// income is reversed. Orders with money already received on credit are
    /// refused; those payments must be reversed first.
    #[instrument(skip(self, rules))]
    pub async fn cancel_order(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        reason: &str,
        rules: &BusinessRules,
        now: DateTime<Utc>,
    ) -> Result<Order, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut order = find_order_in(&mut *tx, tenant_id, order_id, true).await?;
        order.cancel(now, reason, rules)?;

        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE tenant_id = $1 AND order_id = $2 ORDER BY installment FOR UPDATE"
        );
        let receivables = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*order_id.as_uuid())
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Receivable::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        for mut receivable in receivables.into_iter().filter(|r| r.status.is_open()) {
            receivable.cancel(reason)?;
            for mut boleto in boletos_of_receivable(&mut *tx, tenant_id, receivable.id).await? {
                if boleto.status.is_open() {
                    boleto.cancel(reason, now)?;
                    update_boleto_in(&mut *tx, &boleto).await?;
                }
            }
            update_receivable_in(&mut *tx, &receivable).await?;
        }

        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM financial_entries
            WHERE tenant_id = $1 AND reference_type = 'order' AND reference_id = $2
              AND status = 'SETTLED' AND reversed_by IS NULL AND reversal_of IS NULL
            FOR UPDATE
            "#
        );
        let income = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*order_id.as_uuid())
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(FinancialEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if !income.is_empty() {
            let accounts: Vec<BankAccountId> = income.iter().map(|e| e.bank_account_id).collect();
            let mut ledger = self.open_ledger(&mut *tx, tenant_id, &accounts).await?;
            for entry in income {
                let id = entry.id;
                ledger.restore(entry)?;
                ledger.reverse(&id, reason, now)?;
            }
            persist_ledger(&mut *tx, &ledger).await?;
        }

        update_order_in(&mut *tx, &order).await?;
        tx.commit().await?;
        info!(order = %order.id, "order cancelled");
        Ok(order)
    }

    // ------------------------------------------------------------------
    // Boletos
    // ------------------------------------------------------------------

    pub async fn find_boleto(&self, tenant_id: TenantId, id: BoletoId) -> Result<Boleto, DatabaseError> {
        let sql = format!("SELECT {BOLETO_COLUMNS} FROM boletos WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, BoletoRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Boleto", id))?
            .try_into()
    }

    pub async fn list_boletos(
        &self,
        tenant_id: TenantId,
        status: Option<BoletoStatus>,
    ) -> Result<Vec<Boleto>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {BOLETO_COLUMNS} FROM boletos
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY due_date, our_number
            "#
        );
        sqlx::query_as::<_, BoletoRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Boleto::try_from)
            .collect()
    }

    /// Issues a new boleto for the outstanding part of an open receivable
    pub async fn issue_boleto(
        &self,
        tenant_id: TenantId,
        receivable_id: ReceivableId,
        account: BankAccountId,
        issuer: &BoletoIssuer,
        now: DateTime<Utc>,
    ) -> Result<Boleto, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let receivable = lock_receivable(&mut *tx, tenant_id, receivable_id).await?;
        if boletos_of_receivable(&mut *tx, tenant_id, receivable_id)
            .await?
            .iter()
            .any(|b| b.status.is_open())
        {
            return Err(FinanceError::InvalidOperation(format!(
                "receivable {receivable_id} already has an open boleto"
            ))
            .into());
        }
        let (bank_account, our_number) = next_our_number(&mut *tx, tenant_id, account).await?;
        let boleto = issuer.issue(&receivable, &bank_account, our_number, now)?;
        insert_boleto_in(&mut *tx, &boleto).await?;
        tx.commit().await?;
        Ok(boleto)
    }

    /// Registers a boleto payment
    ///
    /// Locks the receivable and then the boleto, applies both transitions, posts
    /// the Sales and LateFees income and credits the collecting account.
    #[instrument(skip(self, timezone))]
    pub async fn pay_boleto(
        &self,
        tenant_id: TenantId,
        id: BoletoId,
        amount: Money,
        paid_at: DateTime<Utc>,
        timezone: &Timezone,
    ) -> Result<(Boleto, BoletoPayment), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let (mut receivable, mut boleto) = lock_receivable_and_boleto(&mut *tx, tenant_id, id).await?;

        let payment = boleto.pay(amount, paid_at, timezone)?;
        receivable.register_payment(payment.total, payment.charges, paid_at)?;
        let entries = payment.ledger_entries(tenant_id, &boleto.our_number)?;
        self.record_settled_in(&mut *tx, tenant_id, entries, paid_at).await?;

        update_boleto_in(&mut *tx, &boleto).await?;
        update_receivable_in(&mut *tx, &receivable).await?;
        tx.commit().await?;
        info!(boleto = %boleto.id, total = %payment.total, charges = %payment.charges, "boleto paid");
        Ok((boleto, payment))
    }

    /// Cancels an open boleto; its receivable stays open for a new one
    pub async fn cancel_boleto(
        &self,
        tenant_id: TenantId,
        id: BoletoId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Boleto, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut boleto = lock_boleto(&mut *tx, tenant_id, id).await?;
        boleto.cancel(reason, at)?;
        update_boleto_in(&mut *tx, &boleto).await?;
        tx.commit().await?;
        info!(boleto = %boleto.id, reason, "boleto cancelled");
        Ok(boleto)
    }

    /// Estorno of a paid boleto
    ///
    /// Reopens the boleto and its receivable and reverses every settled
    /// entry the payment posted, restoring the account balance.
    #[instrument(skip(self, timezone, sweep))]
    pub async fn reverse_boleto_payment(
        &self,
        tenant_id: TenantId,
        id: BoletoId,
        reason: &str,
        at: DateTime<Utc>,
        timezone: &Timezone,
        sweep: &OverdueSweep,
    ) -> Result<Boleto, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let (mut receivable, mut boleto) = lock_receivable_and_boleto(&mut *tx, tenant_id, id).await?;
        let today = timezone.local_date(at);

        let payment = boleto.reverse_payment(at, timezone, sweep)?;
        receivable.reverse_payment(payment.principal, payment.charges, today, sweep)?;

        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM financial_entries
            WHERE tenant_id = $1 AND reference_type = 'boleto' AND reference_id = $2
              AND status = 'SETTLED' AND reversed_by IS NULL AND reversal_of IS NULL
            FOR UPDATE
            "#
        );
        let posted = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(FinancialEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut ledger = self.open_ledger(&mut *tx, tenant_id, &[boleto.bank_account_id]).await?;
        let ids: Vec<FinancialEntryId> = posted.iter().map(|e| e.id).collect();
        for entry in posted {
            ledger.restore(entry)?;
        }
        for entry_id in &ids {
            ledger.reverse(entry_id, reason, at)?;
        }
        persist_ledger(&mut *tx, &ledger).await?;

        update_boleto_in(&mut *tx, &boleto).await?;
        update_receivable_in(&mut *tx, &receivable).await?;
        tx.commit().await?;
        warn!(boleto = %boleto.id, reversed = ids.len(), reason, "boleto payment reversed");
        Ok(boleto)
    }

    // ------------------------------------------------------------------
    // Overdue sweep
    // ------------------------------------------------------------------

    /// Flags one tenant's late boletos and receivables
    ///
    /// Rows locked by a concurrent payment are skipped and picked up by the
    /// next run.
    #[instrument(skip(self, sweep))]
    pub async fn run_overdue_sweep(
        &self,
        tenant_id: TenantId,
        today: NaiveDate,
        sweep: &OverdueSweep,
    ) -> Result<SweepReport, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            SELECT {BOLETO_COLUMNS} FROM boletos
            WHERE tenant_id = $1 AND status = 'PENDING' AND due_date < $2
            FOR UPDATE SKIP LOCKED
            "#
        );
        let mut boletos = sqlx::query_as::<_, BoletoRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(today)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Boleto::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let sql = format!(
            r#"
            SELECT {RECEIVABLE_COLUMNS} FROM receivables
            WHERE tenant_id = $1 AND status IN ('PENDING', 'PARTIAL') AND due_date < $2
            FOR UPDATE SKIP LOCKED
            "#
        );
        let mut receivables = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(today)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Receivable::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let report = sweep.run(today, &mut boletos, &mut receivables);

        for boleto in boletos.iter().filter(|b| report.boletos_marked.contains(&b.id)) {
            update_boleto_in(&mut *tx, boleto).await?;
        }
        for receivable in receivables.iter().filter(|r| report.receivables_marked.contains(&r.id)) {
            update_receivable_in(&mut *tx, receivable).await?;
        }
        tx.commit().await?;
        debug!(marked = report.total_marked(), "overdue sweep finished for tenant");
        Ok(report)
    }

    /// Runs the sweep for every active tenant on its own local date
    ///
    /// A failing tenant is logged and skipped so the others still run.
    pub async fn run_overdue_sweep_all(
        &self,
        now: DateTime<Utc>,
        sweep: &OverdueSweep,
    ) -> Result<SweepReport, DatabaseError> {
        let tenants = sqlx::query_as::<_, TenantRecord>(
            "SELECT id, name, cnpj, uf_code, timezone, active, created_at FROM tenants WHERE active ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut total = SweepReport::default();
        for tenant in &tenants {
            let today = tenant.timezone().local_date(now);
            match self.run_overdue_sweep(tenant.tenant_id(), today, sweep).await {
                Ok(report) => total.merge(report),
                Err(e) => warn!(tenant = %tenant.tenant_id(), error = %e, "overdue sweep failed for tenant"),
            }
        }
        info!(tenants = tenants.len(), marked = total.total_marked(), "overdue sweep finished");
        Ok(total)
    }

    // ------------------------------------------------------------------
    // Closings
    // ------------------------------------------------------------------

    pub async fn list_closings(&self, tenant_id: TenantId) -> Result<Vec<FinancialClosing>, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        closings_in(&mut conn, tenant_id, false).await
    }

    pub async fn find_closing(&self, tenant_id: TenantId, id: ClosingId) -> Result<FinancialClosing, DatabaseError> {
        let sql = format!("SELECT {CLOSING_COLUMNS} FROM financial_closings WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, ClosingRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Closing", id))?
            .try_into()
    }

    /// Summarises and closes a period
    ///
    /// A reopened closing for exactly the same period is recomputed and
    /// closed again; any other overlap is rejected.
    #[instrument(skip(self, builder))]
    pub async fn close_period(
        &self,
        tenant_id: TenantId,
        period: DateRange,
        builder: &ClosingBuilder,
        by: UserId,
        at: DateTime<Utc>,
    ) -> Result<FinancialClosing, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let accounts = lock_all_accounts(&mut *tx, tenant_id).await?;
        let existing = closings_in(&mut *tx, tenant_id, true).await?;

        let reopened = existing
            .iter()
            .find(|c| c.period == period && c.status == ClosingStatus::Open)
            .map(|c| c.id);
        let others: Vec<FinancialClosing> = existing.into_iter().filter(|c| Some(c.id) != reopened).collect();
        FinancialClosing::ensure_no_overlap(&period, &others)?;

        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM financial_entries
            WHERE tenant_id = $1
              AND (competence_date BETWEEN $2 AND $3
                   OR (status = 'PENDING' AND due_date BETWEEN $2 AND $3))
            "#
        );
        let entries = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(period.start)
            .bind(period.end)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(FinancialEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let openings = opening_balances(&mut *tx, tenant_id, &accounts, period.start).await?;
        let mut closing = builder.build(tenant_id, period, &accounts, &entries, &openings)?;
        if let Some(id) = reopened {
            closing.id = id;
        }
        closing.close(by, at)?;

        match reopened {
            Some(_) => update_closing_in(&mut *tx, &closing).await?,
            None => insert_closing_in(&mut *tx, &closing).await?,
        }
        tx.commit().await?;
        info!(closing = %closing.id, start = %period.start, end = %period.end, net = %closing.net_result, "period closed");
        Ok(closing)
    }

    /// Reopens a closed period so its entries can be corrected
    pub async fn reopen_closing(
        &self,
        tenant_id: TenantId,
        id: ClosingId,
        by: UserId,
        at: DateTime<Utc>,
    ) -> Result<FinancialClosing, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "SELECT {CLOSING_COLUMNS} FROM financial_closings WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        );
        let mut closing: FinancialClosing = sqlx::query_as::<_, ClosingRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Closing", id))?
            .try_into()?;
        closing.reopen(by, at)?;
        update_closing_in(&mut *tx, &closing).await?;
        tx.commit().await?;
        warn!(closing = %closing.id, by = %by, "period reopened");
        Ok(closing)
    }

    // ------------------------------------------------------------------
    // Ledger slices
    // ------------------------------------------------------------------

    /// Locks the given accounts and builds a ledger over them
    ///
    /// Closed periods are locked in the ledger so the domain rejects any
    /// change dated inside them.
    async fn open_ledger(
        &self,
        conn: &mut PgConnection,
        tenant_id: TenantId,
        account_ids: &[BankAccountId],
    ) -> Result<Ledger, DatabaseError> {
        let accounts = lock_accounts(conn, tenant_id, account_ids).await?;
        let currency = accounts
            .first()
            .map(|a| a.currency())
            .ok_or_else(|| DatabaseError::not_found("Bank account", "none given"))?;

        let mut ledger = Ledger::new(tenant_id, currency).with_overdraft(self.allow_overdraft);
        for account in accounts {
            ledger.add_account(account)?;
        }
        for closing in closings_in(conn, tenant_id, false).await? {
            if closing.status == ClosingStatus::Closed {
                ledger.lock_period(closing.period)?;
            }
        }
        Ok(ledger)
    }
}

// ============================================================================
// Statements shared by the flows above
// ============================================================================

fn check_credit(limit: (Decimal, String, bool), open: Money, requested: Money) -> Result<(), DatabaseError> {
    let (limit, code, active) = limit;
    if !active {
        return Err(domain_orders::OrderError::InactiveCustomer.into());
    }
    let available = money(limit, currency(&code)?)
        .checked_sub(&open)
        .map_err(FinanceError::from)?;
    if requested > available {
        return Err(domain_orders::OrderError::CreditLimitExceeded { available, requested }.into());
    }
    Ok(())
}

async fn lock_accounts(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    ids: &[BankAccountId],
) -> Result<Vec<BankAccount>, DatabaseError> {
    let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
    // Consistent lock order keeps concurrent transfers from deadlocking
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE tenant_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE"
    );
    let accounts = sqlx::query_as::<_, BankAccountRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(&uuids)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(BankAccount::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(missing) = ids.iter().find(|id| !accounts.iter().any(|a| &a.id == *id)) {
        return Err(FinanceError::AccountNotFound(missing.to_string()).into());
    }
    Ok(accounts)
}

async fn lock_all_accounts(conn: &mut PgConnection, tenant_id: TenantId) -> Result<Vec<BankAccount>, DatabaseError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE tenant_id = $1 ORDER BY id FOR UPDATE");
    sqlx::query_as::<_, BankAccountRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(BankAccount::try_from)
        .collect()
}

/// Balance of each account at the start of `date`
///
/// Current balance minus every settled movement dated on or after `date`.
async fn opening_balances(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    accounts: &[BankAccount],
    date: NaiveDate,
) -> Result<HashMap<BankAccountId, Money>, DatabaseError> {
    let movements: Vec<(Uuid, Decimal)> = sqlx::query_as(
        r#"
        SELECT bank_account_id,
               SUM(CASE WHEN kind IN ('income', 'transfer_in') THEN amount ELSE -amount END)
        FROM financial_entries
        WHERE tenant_id = $1 AND status = 'SETTLED' AND competence_date >= $2
        GROUP BY bank_account_id
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(date)
    .fetch_all(&mut *conn)
    .await?;

    let mut openings = HashMap::with_capacity(accounts.len());
    for account in accounts {
        let later = movements
            .iter()
            .find(|(id, _)| id == account.id.as_uuid())
            .map(|(_, sum)| *sum)
            .unwrap_or(Decimal::ZERO);
        openings.insert(account.id, money(account.balance.amount() - later, account.currency()));
    }
    Ok(openings)
}

async fn next_our_number(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    account_id: BankAccountId,
) -> Result<(BankAccount, u64), DatabaseError> {
    let sequence: i64 = sqlx::query_scalar(
        r#"
        UPDATE bank_accounts SET boleto_sequence = boleto_sequence + 1
        WHERE tenant_id = $1 AND id = $2
        RETURNING boleto_sequence
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(*account_id.as_uuid())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| FinanceError::AccountNotFound(account_id.to_string()))?;

    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM bank_accounts WHERE id = $1");
    let account: BankAccount = sqlx::query_as::<_, BankAccountRow>(&sql)
        .bind(*account_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?
        .try_into()?;
    let our_number = super::to_u64("boleto_sequence", sequence)?;
    Ok((account, our_number))
}

async fn open_balance_in(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    customer_id: CustomerId,
) -> Result<Money, DatabaseError> {
    let open: Option<Decimal> = sqlx::query_scalar(
        r#"
        SELECT SUM(amount - amount_paid) FROM receivables
        WHERE tenant_id = $1 AND customer_id = $2 AND status IN ('PENDING', 'PARTIAL', 'OVERDUE')
        "#,
    )
    .bind(*tenant_id.as_uuid())
    .bind(*customer_id.as_uuid())
    .fetch_one(&mut *conn)
    .await?;
    Ok(Money::brl(open.unwrap_or(Decimal::ZERO)))
}

async fn lock_entry(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    id: FinancialEntryId,
) -> Result<FinancialEntry, DatabaseError> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM financial_entries WHERE tenant_id = $1 AND id = $2 FOR UPDATE");
    sqlx::query_as::<_, EntryRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Financial entry", id))?
        .try_into()
}

async fn lock_receivable(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    id: ReceivableId,
) -> Result<Receivable, DatabaseError> {
    let sql = format!("SELECT {RECEIVABLE_COLUMNS} FROM receivables WHERE tenant_id = $1 AND id = $2 FOR UPDATE");
    sqlx::query_as::<_, ReceivableRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Receivable", id))?
        .try_into()
}

async fn lock_boleto(conn: &mut PgConnection, tenant_id: TenantId, id: BoletoId) -> Result<Boleto, DatabaseError> {
    let sql = format!("SELECT {BOLETO_COLUMNS} FROM boletos WHERE tenant_id = $1 AND id = $2 FOR UPDATE");
    sqlx::query_as::<_, BoletoRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Boleto", id))?
        .try_into()
}

/// Locks a boleto's receivable before the boleto itself
///
/// Every flow that holds both rows takes the receivable first, as
/// `cancel_receivable` and `cancel_order` do.
async fn lock_receivable_and_boleto(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    id: BoletoId,
) -> Result<(Receivable, Boleto), DatabaseError> {
    let receivable_id: Uuid = sqlx::query_scalar("SELECT receivable_id FROM boletos WHERE tenant_id = $1 AND id = $2")
        .bind(*tenant_id.as_uuid())
        .bind(*id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Boleto", id))?;
    let receivable = lock_receivable(&mut *conn, tenant_id, ReceivableId::from_uuid(receivable_id)).await?;
    let boleto = lock_boleto(&mut *conn, tenant_id, id).await?;
    Ok((receivable, boleto))
}

async fn boletos_of_receivable(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    receivable_id: ReceivableId,
) -> Result<Vec<Boleto>, DatabaseError> {
    let sql = format!(
        "SELECT {BOLETO_COLUMNS} FROM boletos WHERE tenant_id = $1 AND receivable_id = $2 FOR UPDATE"
    );
    sqlx::query_as::<_, BoletoRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*receivable_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(Boleto::try_from)
        .collect()
}

async fn closings_in(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    for_update: bool,
) -> Result<Vec<FinancialClosing>, DatabaseError> {
    let lock = if for_update { "FOR UPDATE" } else { "" };
    let sql = format!(
        "SELECT {CLOSING_COLUMNS} FROM financial_closings WHERE tenant_id = $1 ORDER BY period_start {lock}"
    );
    sqlx::query_as::<_, ClosingRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(FinancialClosing::try_from)
        .collect()
}

/// Upserts every entry of the ledger slice and writes back account balances
async fn persist_ledger(conn: &mut PgConnection, ledger: &Ledger) -> Result<(), DatabaseError> {
    for entry in ledger.entries() {
        sqlx::query(
            r#"
            INSERT INTO financial_entries (
                id, tenant_id, bank_account_id, kind, category, description, amount, currency,
                competence_date, due_date, settled_at, status, reference_type, reference_id,
                transfer_pair, reversal_of, reversed_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                settled_at = EXCLUDED.settled_at,
                reversed_by = EXCLUDED.reversed_by
            "#,
        )
        .bind(*entry.id.as_uuid())
        .bind(*entry.tenant_id.as_uuid())
        .bind(*entry.bank_account_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.category.as_str())
        .bind(&entry.description)
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().code())
        .bind(entry.competence_date)
        .bind(entry.due_date)
        .bind(entry.settled_at)
        .bind(entry.status.as_str())
        .bind(&entry.reference_type)
        .bind(entry.reference_id)
        .bind(entry.transfer_pair.map(|id| *id.as_uuid()))
        .bind(entry.reversal_of.map(|id| *id.as_uuid()))
        .bind(entry.reversed_by.map(|id| *id.as_uuid()))
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;
    }

    for account in ledger.accounts() {
        sqlx::query("UPDATE bank_accounts SET balance = $2 WHERE id = $1")
            .bind(*account.id.as_uuid())
            .bind(account.balance.amount())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_receivable_in(conn: &mut PgConnection, receivable: &Receivable) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO receivables (
            id, tenant_id, customer_id, order_id, installment, description, amount, amount_paid,
            charges_paid, currency, due_date, status, paid_at, cancel_reason, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(*receivable.id.as_uuid())
    .bind(*receivable.tenant_id.as_uuid())
    .bind(*receivable.customer_id.as_uuid())
    .bind(receivable.order_id.map(|id| *id.as_uuid()))
    .bind(receivable.installment as i32)
    .bind(&receivable.description)
    .bind(receivable.amount.amount())
    .bind(receivable.amount_paid.amount())
    .bind(receivable.charges_paid.amount())
    .bind(receivable.amount.currency().code())
    .bind(receivable.due_date)
    .bind(receivable.status.as_str())
    .bind(receivable.paid_at)
    .bind(&receivable.cancel_reason)
    .bind(receivable.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_receivable_in(conn: &mut PgConnection, receivable: &Receivable) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE receivables SET
            amount_paid = $3, charges_paid = $4, status = $5, paid_at = $6, cancel_reason = $7
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*receivable.tenant_id.as_uuid())
    .bind(*receivable.id.as_uuid())
    .bind(receivable.amount_paid.amount())
    .bind(receivable.charges_paid.amount())
    .bind(receivable.status.as_str())
    .bind(receivable.paid_at)
    .bind(&receivable.cancel_reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_boleto_in(conn: &mut PgConnection, boleto: &Boleto) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO boletos (
            id, tenant_id, receivable_id, customer_id, bank_account_id, our_number, digitable_line,
            barcode, amount, currency, due_date, status, fine_rate, monthly_interest_rate,
            paid_amount, paid_at, cancelled_at, cancel_reason, issued_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(*boleto.id.as_uuid())
    .bind(*boleto.tenant_id.as_uuid())
    .bind(*boleto.receivable_id.as_uuid())
    .bind(*boleto.customer_id.as_uuid())
    .bind(*boleto.bank_account_id.as_uuid())
    .bind(&boleto.our_number)
    .bind(&boleto.digitable_line)
    .bind(&boleto.barcode)
    .bind(boleto.amount.amount())
    .bind(boleto.amount.currency().code())
    .bind(boleto.due_date)
    .bind(boleto.status.as_str())
    .bind(boleto.fine_rate.as_decimal())
    .bind(boleto.monthly_interest_rate.as_decimal())
    .bind(boleto.paid_amount.map(|m| m.amount()))
    .bind(boleto.paid_at)
    .bind(boleto.cancelled_at)
    .bind(&boleto.cancel_reason)
    .bind(boleto.issued_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_boleto_in(conn: &mut PgConnection, boleto: &Boleto) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE boletos SET
            status = $3, paid_amount = $4, paid_at = $5, cancelled_at = $6, cancel_reason = $7
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*boleto.tenant_id.as_uuid())
    .bind(*boleto.id.as_uuid())
    .bind(boleto.status.as_str())
    .bind(boleto.paid_amount.map(|m| m.amount()))
    .bind(boleto.paid_at)
    .bind(boleto.cancelled_at)
    .bind(&boleto.cancel_reason)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_closing_in(conn: &mut PgConnection, closing: &FinancialClosing) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO financial_closings (
            id, tenant_id, period_start, period_end, accounts, total_income, total_expense,
            net_result, currency, status, closed_by, closed_at, reopened_by, reopened_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(*closing.id.as_uuid())
    .bind(*closing.tenant_id.as_uuid())
    .bind(closing.period.start)
    .bind(closing.period.end)
    .bind(sqlx::types::Json(&closing.accounts))
    .bind(closing.total_income.amount())
    .bind(closing.total_expense.amount())
    .bind(closing.net_result.amount())
    .bind(closing.net_result.currency().code())
    .bind(closing.status.as_str())
    .bind(closing.closed_by.map(|u| *u.as_uuid()))
    .bind(closing.closed_at)
    .bind(closing.reopened_by.map(|u| *u.as_uuid()))
    .bind(closing.reopened_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_closing_in(conn: &mut PgConnection, closing: &FinancialClosing) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE financial_closings SET
            accounts = $3, total_income = $4, total_expense = $5, net_result = $6, status = $7,
            closed_by = $8, closed_at = $9, reopened_by = $10, reopened_at = $11
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*closing.tenant_id.as_uuid())
    .bind(*closing.id.as_uuid())
    .bind(sqlx::types::Json(&closing.accounts))
    .bind(closing.total_income.amount())
    .bind(closing.total_expense.amount())
    .bind(closing.net_result.amount())
    .bind(closing.status.as_str())
    .bind(closing.closed_by.map(|u| *u.as_uuid()))
    .bind(closing.closed_at)
    .bind(closing.reopened_by.map(|u| *u.as_uuid()))
    .bind(closing.reopened_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn boleto_row() -> BoletoRow {
        BoletoRow {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            receivable_id: Uuid::now_v7(),
            customer_id: Uuid::now_v7(),
            bank_account_id: Uuid::now_v7(),
            our_number: "00000000042".to_string(),
            digitable_line: "0".repeat(47),
            barcode: "0".repeat(44),
            amount: dec!(150.00),
            currency: "BRL".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            status: "OVERDUE".to_string(),
            fine_rate: dec!(0.02),
            monthly_interest_rate: dec!(0.01),
            paid_amount: None,
            paid_at: None,
            cancelled_at: None,
            cancel_reason: None,
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_boleto_row_keeps_rates_as_fractions() {
        let boleto = Boleto::try_from(boleto_row()).unwrap();
        assert_eq!(boleto.status, BoletoStatus::Overdue);
        assert_eq!(boleto.fine_rate.as_decimal(), dec!(0.02));
        assert_eq!(boleto.monthly_interest_rate.as_percentage(), dec!(1));
        assert_eq!(boleto.amount, Money::brl(dec!(150.00)));
    }

    #[test]
    fn test_unknown_status_is_a_serialization_error() {
        let mut row = boleto_row();
        row.status = "LOST".to_string();
        let error = Boleto::try_from(row).unwrap_err();
        assert!(matches!(error, DatabaseError::SerializationError(_)));
    }

    #[test]
    fn test_credit_check_uses_open_balance() {
        let open = Money::brl(dec!(800));
        assert!(check_credit((dec!(1000), "BRL".to_string(), true), open, Money::brl(dec!(200))).is_ok());

        let error = check_credit((dec!(1000), "BRL".to_string(), true), open, Money::brl(dec!(200.01))).unwrap_err();
        assert!(matches!(
            error,
            DatabaseError::Order(domain_orders::OrderError::CreditLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_credit_check_rejects_inactive_customer() {
        let error = check_credit((dec!(1000), "BRL".to_string(), false), Money::brl(dec!(0)), Money::brl(dec!(10)))
            .unwrap_err();
        assert!(error.is_domain_error());
    }
}
