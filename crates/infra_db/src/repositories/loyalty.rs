//! Loyalty accounts and referrals

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use core_kernel::{CustomerId, LoyaltyAccountId, Money, OrderId, ReferralId, TenantId};
use domain_loyalty::{LoyaltyAccount, LoyaltyError, LoyaltyProgram, Referral, ReferralStatus, Tier};
use domain_orders::OrderStatus;

use super::orders::find_order_in;
use super::{column, to_i64, to_u64};
use crate::error::DatabaseError;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    tenant_id: Uuid,
    customer_id: Uuid,
    points_balance: i64,
    lifetime_points: i64,
    tier: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for LoyaltyAccount {
    type Error = DatabaseError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(LoyaltyAccount {
            id: LoyaltyAccountId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            customer_id: CustomerId::from_uuid(row.customer_id),
            points_balance: to_u64("points_balance", row.points_balance)?,
            lifetime_points: to_u64("lifetime_points", row.lifetime_points)?,
            tier: column("tier", &row.tier, Tier::parse)?,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferralRow {
    id: Uuid,
    tenant_id: Uuid,
    referrer_id: Uuid,
    referred_id: Uuid,
    code: String,
    status: String,
    reward_points: i64,
    created_at: DateTime<Utc>,
    qualified_at: Option<DateTime<Utc>>,
    rewarded_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReferralRow> for Referral {
    type Error = DatabaseError;

    fn try_from(row: ReferralRow) -> Result<Self, Self::Error> {
        Ok(Referral {
            id: ReferralId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            referrer_id: CustomerId::from_uuid(row.referrer_id),
            referred_id: CustomerId::from_uuid(row.referred_id),
            code: row.code,
            status: column("status", &row.status, ReferralStatus::parse)?,
            reward_points: to_u64("reward_points", row.reward_points)?,
            created_at: row.created_at,
            qualified_at: row.qualified_at,
            rewarded_at: row.rewarded_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str = "id, tenant_id, customer_id, points_balance, lifetime_points, tier, updated_at";

const REFERRAL_COLUMNS: &str =
    "id, tenant_id, referrer_id, referred_id, code, status, reward_points, created_at, qualified_at, rewarded_at";

/// Points earned for an order and the referral it may have completed
#[derive(Debug, Clone)]
pub struct PointsAwarded {
    pub account: LoyaltyAccount,
    pub points: u64,
    pub referral: Option<Referral>,
}

/// Repository for loyalty accounts and referrals
#[derive(Debug, Clone)]
pub struct LoyaltyRepository {
    pool: PgPool,
}

impl LoyaltyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The customer's account, opened with zero points on first use
    pub async fn account_for(&self, tenant_id: TenantId, customer_id: CustomerId) -> Result<LoyaltyAccount, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        lock_or_open_account(&mut conn, tenant_id, customer_id, false).await
    }

    pub async fn list_accounts(&self, tenant_id: TenantId, limit: i64) -> Result<Vec<LoyaltyAccount>, DatabaseError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM loyalty_accounts WHERE tenant_id = $1 ORDER BY lifetime_points DESC LIMIT $2"
        );
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LoyaltyAccount::try_from)
            .collect()
    }

    /// Credits points for a delivered order, once per order
    ///
    /// When it is the customer's first delivered order and a referral is
    /// pending for them, the referral is qualified and the referrer is
    /// rewarded in the same transaction.
    #[instrument(skip(self, program))]
    pub async fn award_order_points(
        &self,
        tenant_id: TenantId,
        order_id: OrderId,
        program: &LoyaltyProgram,
        now: DateTime<Utc>,
    ) -> Result<PointsAwarded, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let order = find_order_in(&mut *tx, tenant_id, order_id, true).await?;
        if order.status != OrderStatus::Delivered {
            return Err(DatabaseError::ConstraintViolation(format!(
                "order {} is {}; points are awarded on delivery",
                order.number,
                order.status.as_str()
            )));
        }
        let flagged = sqlx::query("UPDATE orders SET points_awarded = TRUE WHERE id = $1 AND NOT points_awarded")
            .bind(*order_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        if flagged.rows_affected() == 0 {
            return Err(DatabaseError::duplicate("Loyalty points", "order", &order.number));
        }

        let mut account = lock_or_open_account(&mut *tx, tenant_id, order.customer_id, true).await?;
        let points = account.earn(&order.total, program);
        update_account_in(&mut *tx, &account).await?;

        let delivered: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE tenant_id = $1 AND customer_id = $2 AND status = 'DELIVERED'",
        )
        .bind(*tenant_id.as_uuid())
        .bind(*order.customer_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        let mut referral = None;
        if delivered == 1 {
            let sql = format!(
                "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE tenant_id = $1 AND referred_id = $2 AND status = 'PENDING' FOR UPDATE"
            );
            let pending: Option<Referral> = sqlx::query_as::<_, ReferralRow>(&sql)
                .bind(*tenant_id.as_uuid())
                .bind(*order.customer_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?
                .map(Referral::try_from)
                .transpose()?;

            if let Some(mut pending) = pending {
                match pending.qualify(&order.total, program, now) {
                    Ok(()) => {
                        let mut referrer = lock_or_open_account(&mut *tx, tenant_id, pending.referrer_id, true).await?;
                        pending.reward(&mut referrer, program, now)?;
                        update_account_in(&mut *tx, &referrer).await?;
                        update_referral_in(&mut *tx, &pending).await?;
                        referral = Some(pending);
                    }
                    Err(LoyaltyError::OrderBelowMinimum { .. }) => {
                        debug!(referral = %pending.id, "first order below referral minimum");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        tx.commit().await?;
        info!(order = %order.id, points, tier = account.tier.as_str(), "loyalty points awarded");
        Ok(PointsAwarded {
            account,
            points,
            referral,
        })
    }

    /// Spends points and returns the updated account with the discount they buy
    pub async fn redeem(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        points: u64,
        program: &LoyaltyProgram,
    ) -> Result<(LoyaltyAccount, Money), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let mut account = lock_or_open_account(&mut *tx, tenant_id, customer_id, true).await?;
        let discount = account.redeem(points, program)?;
        update_account_in(&mut *tx, &account).await?;
        tx.commit().await?;
        info!(account = %account.id, points, discount = %discount, "points redeemed");
        Ok((account, discount))
    }

    // ------------------------------------------------------------------
    // Referrals
    // ------------------------------------------------------------------

    /// Registers that `referred_id` joined with a customer's referral code
    pub async fn register_referral(
        &self,
        tenant_id: TenantId,
        code: &str,
        referred_id: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<Referral, DatabaseError> {
        let referrer: Uuid = sqlx::query_scalar(
            "SELECT id FROM customers WHERE tenant_id = $1 AND referral_code = $2 AND active",
        )
        .bind(*tenant_id.as_uuid())
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Referral code", code))?;

        let existing = self.referrals_for(tenant_id, referred_id).await?;
        let referral = Referral::register(
            tenant_id,
            CustomerId::from_uuid(referrer),
            referred_id,
            code,
            &existing,
            now,
        )?;

        sqlx::query(
            r#"
            INSERT INTO referrals (
                id, tenant_id, referrer_id, referred_id, code, status, reward_points,
                created_at, qualified_at, rewarded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*referral.id.as_uuid())
        .bind(*referral.tenant_id.as_uuid())
        .bind(*referral.referrer_id.as_uuid())
        .bind(*referral.referred_id.as_uuid())
        .bind(&referral.code)
        .bind(referral.status.as_str())
        .bind(to_i64("reward_points", referral.reward_points)?)
        .bind(referral.created_at)
        .bind(referral.qualified_at)
        .bind(referral.rewarded_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => LoyaltyError::AlreadyReferred(referred_id.to_string()).into(),
            other => other,
        })?;
        info!(referral = %referral.id, referrer = %referral.referrer_id, "referral registered");
        Ok(referral)
    }

    pub async fn find_referral(&self, tenant_id: TenantId, id: ReferralId) -> Result<Referral, DatabaseError> {
        let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE tenant_id = $1 AND id = $2");
        sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Referral", id))?
            .try_into()
    }

    pub async fn list_referrals(
        &self,
        tenant_id: TenantId,
        status: Option<ReferralStatus>,
    ) -> Result<Vec<Referral>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {REFERRAL_COLUMNS} FROM referrals
            WHERE tenant_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#
        );
        sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Referral::try_from)
            .collect()
    }

    async fn referrals_for(&self, tenant_id: TenantId, referred_id: CustomerId) -> Result<Vec<Referral>, DatabaseError> {
        let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE tenant_id = $1 AND referred_id = $2");
        sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .bind(*referred_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Referral::try_from)
            .collect()
    }

    /// Expires pending referrals older than the program window; returns how many
    pub async fn expire_stale_referrals(
        &self,
        tenant_id: TenantId,
        program: &LoyaltyProgram,
        now: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE tenant_id = $1 AND status = 'PENDING' FOR UPDATE SKIP LOCKED"
        );
        let pending = sqlx::query_as::<_, ReferralRow>(&sql)
            .bind(*tenant_id.as_uuid())
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Referral::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut expired = 0;
        for mut referral in pending {
            if referral.expire_if_stale(now, program) {
                update_referral_in(&mut *tx, &referral).await?;
                expired += 1;
            }
        }
        tx.commit().await?;
        if expired > 0 {
            info!(tenant = %tenant_id, expired, "stale referrals expired");
        }
        Ok(expired)
    }
}

async fn lock_or_open_account(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    customer_id: CustomerId,
    for_update: bool,
) -> Result<LoyaltyAccount, DatabaseError> {
    let fresh = LoyaltyAccount::open(tenant_id, customer_id);
    sqlx::query(
        r#"
        INSERT INTO loyalty_accounts (id, tenant_id, customer_id, points_balance, lifetime_points, tier, updated_at)
        VALUES ($1, $2, $3, 0, 0, $4, $5)
        ON CONFLICT (tenant_id, customer_id) DO NOTHING
        "#,
    )
    .bind(*fresh.id.as_uuid())
    .bind(*tenant_id.as_uuid())
    .bind(*customer_id.as_uuid())
    .bind(fresh.tier.as_str())
    .bind(fresh.updated_at)
    .execute(&mut *conn)
    .await?;

    let lock = if for_update { "FOR UPDATE" } else { "" };
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM loyalty_accounts WHERE tenant_id = $1 AND customer_id = $2 {lock}"
    );
    sqlx::query_as::<_, AccountRow>(&sql)
        .bind(*tenant_id.as_uuid())
        .bind(*customer_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?
        .try_into()
}

async fn update_account_in(conn: &mut PgConnection, account: &LoyaltyAccount) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE loyalty_accounts SET
            points_balance = $3, lifetime_points = $4, tier = $5, updated_at = $6
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*account.tenant_id.as_uuid())
    .bind(*account.id.as_uuid())
    .bind(to_i64("points_balance", account.points_balance)?)
    .bind(to_i64("lifetime_points", account.lifetime_points)?)
    .bind(account.tier.as_str())
    .bind(account.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_referral_in(conn: &mut PgConnection, referral: &Referral) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        UPDATE referrals SET
            status = $3, reward_points = $4, qualified_at = $5, rewarded_at = $6
        WHERE tenant_id = $1 AND id = $2
        "#,
    )
    .bind(*referral.tenant_id.as_uuid())
    .bind(*referral.id.as_uuid())
    .bind(referral.status.as_str())
    .bind(to_i64("reward_points", referral.reward_points)?)
    .bind(referral.qualified_at)
    .bind(referral.rewarded_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
