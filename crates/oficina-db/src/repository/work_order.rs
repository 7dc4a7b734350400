//! # Work Order Repository
//!
//! Database operations for work orders, their line items and payments.
//!
//! ## Work Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Work Order Lifecycle                                │
//! │                                                                         │
//! │  create() / convert ──► Open                                           │
//! │                          │ start()            stamps started_at        │
//! │                          ▼                                              │
//! │                      InProgress                                         │
//! │                          │ complete()          requires ALL items done │
//! │                          ▼                     stamps completed_at     │
//! │                      Completed ◄──────────┐                            │
//! │                          │ record_payment(amount)                      │
//! │                          │   paid + amount ≤ total, enforced in the   │
//! │                          │   UPDATE itself (no read-then-write race)  │
//! │                          ▼                                              │
//! │                      Paid (when paid == total, fully_paid_at stamped  │
//! │                            exactly once)                               │
//! │                                                                         │
//! │  cancel() reaches Cancelled from any non-paid status                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use oficina_core::validation::{validate_payment_amount, validate_quantity, validate_unit_price};
use oficina_core::{
    ledger, GuardViolation, Money, WorkOrder, WorkOrderItem, WorkOrderPriority, WorkOrderStatus,
    OVERDUE_AFTER_DAYS,
};

// =============================================================================
// Input Types
// =============================================================================

/// Input for a directly created work order (no originating quote).
#[derive(Debug, Clone)]
pub struct NewWorkOrder {
    pub vehicle_id: String,
    pub author_id: String,
    pub priority: Option<WorkOrderPriority>,
    pub notes: Option<String>,
}

/// Input for a new work-order line item.
#[derive(Debug, Clone)]
pub struct NewWorkOrderItem {
    pub service_type_id: String,
    pub description: Option<String>,
    pub quantity: i64,
    /// Omitted or zero falls back to the service type's catalog price.
    pub unit_price: Option<Money>,
}

// =============================================================================
// Row Fetch Helpers
// =============================================================================

const WORK_ORDER_COLUMNS: &str = "id, vehicle_id, author_id, quote_id, status, priority, \
     total_amount_cents, paid_amount_cents, currency, notes, started_at, completed_at, \
     fully_paid_at, created_at, updated_at";

const WORK_ORDER_ITEM_COLUMNS: &str = "id, work_order_id, service_type_id, description, \
     quantity, unit_price_cents, total_price_cents, currency, completed, created_at, updated_at";

async fn fetch_work_order<'e, E>(ex: E, id: &str) -> DbResult<Option<WorkOrder>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let wo = sqlx::query_as::<_, WorkOrder>(&format!(
        "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(wo)
}

async fn require_work_order<'e, E>(ex: E, id: &str) -> DbResult<WorkOrder>
where
    E: Executor<'e, Database = Sqlite>,
{
    fetch_work_order(ex, id)
        .await?
        .ok_or_else(|| DbError::not_found("WorkOrder", id))
}

async fn fetch_items<'e, E>(ex: E, work_order_id: &str) -> DbResult<Vec<WorkOrderItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, WorkOrderItem>(&format!(
        "SELECT {WORK_ORDER_ITEM_COLUMNS} FROM work_order_items \
         WHERE work_order_id = ?1 ORDER BY created_at"
    ))
    .bind(work_order_id)
    .fetch_all(ex)
    .await?;
    Ok(items)
}

/// Recomputes and persists the order's total from its current items.
///
/// The total is preserved as-is when no items exist: right after quote
/// conversion the copied quote total stands in until items arrive, and it
/// must not be zeroed in between.
async fn recompute_work_order_total(
    tx: &mut Transaction<'_, Sqlite>,
    work_order_id: &str,
) -> DbResult<Money> {
    let wo = require_work_order(&mut **tx, work_order_id).await?;
    let items = fetch_items(&mut **tx, work_order_id).await?;

    let total = ledger::work_order_total(&items, wo.total_amount())?;
    let total = ledger::validate_stored_total(total)?;

    sqlx::query("UPDATE work_orders SET total_amount_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(work_order_id)
        .bind(total.cents())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

    Ok(total)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for work-order database operations.
#[derive(Debug, Clone)]
pub struct WorkOrderRepository {
    pool: SqlitePool,
}

impl WorkOrderRepository {
    /// Creates a new WorkOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WorkOrderRepository { pool }
    }

    // -------------------------------------------------------------------------
    // CRUD
    // -------------------------------------------------------------------------

    /// Creates a work order directly (walk-in jobs with no prior quote).
    /// Starts open, empty ledger, nothing paid.
    pub async fn create(&self, new: NewWorkOrder) -> DbResult<WorkOrder> {
        let now = Utc::now();
        let wo = WorkOrder {
            id: Uuid::new_v4().to_string(),
            vehicle_id: new.vehicle_id,
            author_id: new.author_id,
            quote_id: None,
            status: WorkOrderStatus::Open,
            priority: new.priority.unwrap_or_default(),
            total_amount_cents: 0,
            paid_amount_cents: 0,
            currency: oficina_core::Currency::BRL,
            notes: new.notes,
            started_at: None,
            completed_at: None,
            fully_paid_at: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %wo.id, vehicle_id = %wo.vehicle_id, "Creating work order");

        sqlx::query(
            r#"
            INSERT INTO work_orders (
                id, vehicle_id, author_id, quote_id, status, priority,
                total_amount_cents, paid_amount_cents, currency, notes,
                started_at, completed_at, fully_paid_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, NULL, ?4, ?5, 0, 0, ?6, ?7, NULL, NULL, NULL, ?8, ?8)
            "#,
        )
        .bind(&wo.id)
        .bind(&wo.vehicle_id)
        .bind(&wo.author_id)
        .bind(wo.status)
        .bind(wo.priority)
        .bind(wo.currency)
        .bind(&wo.notes)
        .bind(wo.created_at)
        .execute(&self.pool)
        .await?;

        Ok(wo)
    }

    /// Gets a work order by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<WorkOrder>> {
        fetch_work_order(&self.pool, id).await
    }

    /// Lists all work orders, newest first.
    pub async fn list(&self) -> DbResult<Vec<WorkOrder>> {
        let rows = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Lists work orders with a given status, newest first.
    pub async fn list_by_status(&self, status: WorkOrderStatus) -> DbResult<Vec<WorkOrder>> {
        let rows = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE status = ?1 \
             ORDER BY created_at DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Lists work orders with a given priority, newest first.
    pub async fn list_by_priority(&self, priority: WorkOrderPriority) -> DbResult<Vec<WorkOrder>> {
        let rows = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE priority = ?1 \
             ORDER BY created_at DESC"
        ))
        .bind(priority)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Lists work orders for a vehicle, newest first.
    pub async fn list_by_vehicle(&self, vehicle_id: &str) -> DbResult<Vec<WorkOrder>> {
        let rows = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE vehicle_id = ?1 \
             ORDER BY created_at DESC"
        ))
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Lists unfinished work orders older than the overdue threshold.
    pub async fn list_overdue(&self) -> DbResult<Vec<WorkOrder>> {
        let cutoff = Utc::now() - chrono::Duration::days(OVERDUE_AFTER_DAYS);
        let rows = sqlx::query_as::<_, WorkOrder>(&format!(
            "SELECT {WORK_ORDER_COLUMNS} FROM work_orders \
             WHERE created_at < ?1 AND status IN ('open', 'in_progress') \
             ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Line Items (the ledger)
    // -------------------------------------------------------------------------

    /// Gets all items for a work order.
    pub async fn get_items(&self, work_order_id: &str) -> DbResult<Vec<WorkOrderItem>> {
        fetch_items(&self.pool, work_order_id).await
    }

    /// Adds a line item and synchronously recomputes the order total.
    pub async fn add_item(
        &self,
        work_order_id: &str,
        new: NewWorkOrderItem,
    ) -> DbResult<WorkOrderItem> {
        validate_quantity(new.quantity)?;

        let mut tx = self.pool.begin().await?;

        let wo = require_work_order(&mut *tx, work_order_id).await?;

        let catalog_price: Option<(i64, oficina_core::Currency)> = sqlx::query_as(
            "SELECT default_price_cents, currency FROM service_types WHERE id = ?1",
        )
        .bind(&new.service_type_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (default_cents, default_currency) = catalog_price
            .ok_or_else(|| DbError::not_found("ServiceType", &new.service_type_id))?;

        let unit_price = ledger::resolve_unit_price(
            new.unit_price,
            Money::from_cents(default_cents, default_currency),
        );
        validate_unit_price(unit_price)?;
        Money::zero(wo.currency).checked_add(unit_price)?;

        let now = Utc::now();
        let item = WorkOrderItem {
            id: Uuid::new_v4().to_string(),
            work_order_id: wo.id.clone(),
            service_type_id: new.service_type_id,
            description: new.description,
            quantity: new.quantity,
            unit_price_cents: unit_price.cents(),
            total_price_cents: ledger::line_total(unit_price, new.quantity).cents(),
            currency: wo.currency,
            completed: false,
            created_at: now,
            updated_at: now,
        };

        debug!(work_order_id = %wo.id, service_type_id = %item.service_type_id,
               "Adding work order item");

        sqlx::query(
            r#"
            INSERT INTO work_order_items (
                id, work_order_id, service_type_id, description, quantity,
                unit_price_cents, total_price_cents, currency, completed,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.work_order_id)
        .bind(&item.service_type_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .bind(item.currency)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await?;

        recompute_work_order_total(&mut tx, &item.work_order_id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Updates an item's quantity (and optionally its unit price), deriving
    /// the line total and the order total inside one transaction.
    pub async fn update_item(
        &self,
        item_id: &str,
        quantity: i64,
        unit_price: Option<Money>,
    ) -> DbResult<WorkOrderItem> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, WorkOrderItem>(&format!(
            "SELECT {WORK_ORDER_ITEM_COLUMNS} FROM work_order_items WHERE id = ?1"
        ))
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("WorkOrderItem", item_id))?;

        let unit_price = ledger::resolve_unit_price(unit_price, existing.unit_price());
        validate_unit_price(unit_price)?;
        Money::zero(existing.currency).checked_add(unit_price)?;

        let total_price = ledger::line_total(unit_price, quantity);
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE work_order_items SET
                quantity = ?2,
                unit_price_cents = ?3,
                total_price_cents = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(item_id)
        .bind(quantity)
        .bind(unit_price.cents())
        .bind(total_price.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        recompute_work_order_total(&mut tx, &existing.work_order_id).await?;
        tx.commit().await?;

        Ok(WorkOrderItem {
            quantity,
            unit_price_cents: unit_price.cents(),
            total_price_cents: total_price.cents(),
            updated_at: now,
            ..existing
        })
    }

    /// Removes an item and recomputes the order total.
    pub async fn remove_item(&self, item_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let work_order_id: Option<String> =
            sqlx::query_scalar("SELECT work_order_id FROM work_order_items WHERE id = ?1")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
        let work_order_id =
            work_order_id.ok_or_else(|| DbError::not_found("WorkOrderItem", item_id))?;

        sqlx::query("DELETE FROM work_order_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        recompute_work_order_total(&mut tx, &work_order_id).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Marks a single item completed or not. Feeds the completion guard and
    /// the percentage shown on the shop-floor board.
    pub async fn set_item_completed(&self, item_id: &str, completed: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE work_order_items SET completed = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(item_id)
        .bind(completed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("WorkOrderItem", item_id));
        }
        Ok(())
    }

    /// Completed items as a rounded whole percentage (0 with no items).
    pub async fn completion_percentage(&self, work_order_id: &str) -> DbResult<u32> {
        let items = fetch_items(&self.pool, work_order_id).await?;
        Ok(ledger::completion_percentage(&items))
    }

    // -------------------------------------------------------------------------
    // Status Transitions
    // -------------------------------------------------------------------------

    /// Starts the work: open → in_progress, stamps `started_at`.
    pub async fn start(&self, id: &str) -> DbResult<WorkOrder> {
        let wo = require_work_order(&self.pool, id).await?;
        if !wo.can_be_started() {
            return Err(GuardViolation::WorkOrderNotStartable {
                work_order_id: wo.id,
                status: wo.status.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE work_orders SET status = 'in_progress', started_at = ?2, updated_at = ?2 \
             WHERE id = ?1 AND status = 'open'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = require_work_order(&self.pool, id).await?;
            return Err(GuardViolation::WorkOrderNotStartable {
                work_order_id: fresh.id,
                status: fresh.status.to_string(),
            }
            .into());
        }

        info!(id = %id, "Work order started");
        require_work_order(&self.pool, id).await
    }

    /// Completes the work: in_progress → completed, stamps `completed_at`.
    ///
    /// Guarded on EVERY line item being marked completed; the item check and
    /// the transition run in one transaction so nobody can sneak an
    /// unfinished item in between.
    pub async fn complete(&self, id: &str) -> DbResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let wo = require_work_order(&mut *tx, id).await?;
        if wo.status != WorkOrderStatus::InProgress {
            return Err(GuardViolation::WorkOrderNotCompletable {
                work_order_id: wo.id,
                status: wo.status.to_string(),
            }
            .into());
        }

        let items = fetch_items(&mut *tx, id).await?;
        let pending = ledger::pending_items(&items);
        if pending > 0 {
            return Err(GuardViolation::ItemsIncomplete {
                work_order_id: wo.id,
                pending,
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE work_orders SET status = 'completed', completed_at = ?2, updated_at = ?2 \
             WHERE id = ?1 AND status = 'in_progress'",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GuardViolation::WorkOrderNotCompletable {
                work_order_id: wo.id,
                status: wo.status.to_string(),
            }
            .into());
        }

        tx.commit().await?;
        info!(id = %id, "Work order completed");
        require_work_order(&self.pool, id).await
    }

    /// Records a payment against a completed work order.
    ///
    /// The ceiling `paid + amount <= total` is enforced INSIDE the UPDATE's
    /// WHERE clause, so two clerks posting payments concurrently can never
    /// overshoot the total between a read and a write. Reaching the full
    /// total flips the order to `paid` and stamps `fully_paid_at` once.
    pub async fn record_payment(&self, id: &str, amount: Money) -> DbResult<WorkOrder> {
        validate_payment_amount(amount)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let wo = require_work_order(&mut *tx, id).await?;
        // Same-currency payments only.
        Money::zero(wo.currency).checked_add(amount)?;

        match wo.status {
            WorkOrderStatus::Completed => {}
            // Already settled in full: any further amount exceeds the total.
            WorkOrderStatus::Paid => {
                return Err(GuardViolation::PaymentExceedsTotal {
                    work_order_id: wo.id,
                    remaining: Money::zero(wo.currency).to_string(),
                }
                .into());
            }
            _ => {
                return Err(GuardViolation::WorkOrderNotPayable {
                    work_order_id: wo.id,
                    status: wo.status.to_string(),
                }
                .into());
            }
        }

        let result = sqlx::query(
            "UPDATE work_orders SET paid_amount_cents = paid_amount_cents + ?2, updated_at = ?3 \
             WHERE id = ?1 AND status = 'completed' \
               AND paid_amount_cents + ?2 <= total_amount_cents",
        )
        .bind(id)
        .bind(amount.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Either another payment landed first and the ceiling would now
            // be crossed, or the status moved. Report from fresh state.
            let fresh = require_work_order(&mut *tx, id).await?;
            if fresh.status == WorkOrderStatus::Completed {
                return Err(GuardViolation::PaymentExceedsTotal {
                    work_order_id: fresh.id.clone(),
                    remaining: fresh.remaining_amount().to_string(),
                }
                .into());
            }
            return Err(GuardViolation::WorkOrderNotPayable {
                work_order_id: fresh.id,
                status: fresh.status.to_string(),
            }
            .into());
        }

        // Auto-transition on full payment. COALESCE keeps the first
        // fully_paid_at stamp if a previous path already set it.
        sqlx::query(
            "UPDATE work_orders SET status = 'paid', \
                    fully_paid_at = COALESCE(fully_paid_at, ?2), updated_at = ?2 \
             WHERE id = ?1 AND status = 'completed' \
               AND paid_amount_cents >= total_amount_cents",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let fresh = require_work_order(&self.pool, id).await?;
        info!(id = %id, paid = %fresh.paid_amount(), total = %fresh.total_amount(),
              status = %fresh.status, "Payment recorded");
        Ok(fresh)
    }

    /// Completes (if needed) and settles the order in one step: the
    /// customer is at the counter picking the vehicle up. Pays the full
    /// remaining balance unless an explicit amount is given. The per-item
    /// completion guard is intentionally bypassed on this path.
    pub async fn finalize_and_pay(&self, id: &str, amount: Option<Money>) -> DbResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let wo = require_work_order(&mut *tx, id).await?;
        if !wo.can_be_finalized() {
            return Err(GuardViolation::WorkOrderNotFinalizable {
                work_order_id: wo.id,
                status: wo.status.to_string(),
            }
            .into());
        }

        if wo.status == WorkOrderStatus::InProgress {
            sqlx::query(
                "UPDATE work_orders SET status = 'completed', \
                        completed_at = COALESCE(completed_at, ?2), updated_at = ?2 \
                 WHERE id = ?1 AND status = 'in_progress'",
            )
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let wo = require_work_order(&mut *tx, id).await?;
        let payment = match amount {
            Some(explicit) => {
                validate_payment_amount(explicit)?;
                Money::zero(wo.currency).checked_add(explicit)?;
                explicit
            }
            None => wo.remaining_amount(),
        };

        if payment.is_positive() {
            let result = sqlx::query(
                "UPDATE work_orders SET paid_amount_cents = paid_amount_cents + ?2, \
                        updated_at = ?3 \
                 WHERE id = ?1 AND status = 'completed' \
                   AND paid_amount_cents + ?2 <= total_amount_cents",
            )
            .bind(id)
            .bind(payment.cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                let fresh = require_work_order(&mut *tx, id).await?;
                return Err(GuardViolation::PaymentExceedsTotal {
                    work_order_id: fresh.id.clone(),
                    remaining: fresh.remaining_amount().to_string(),
                }
                .into());
            }
        }

        sqlx::query(
            "UPDATE work_orders SET status = 'paid', \
                    fully_paid_at = COALESCE(fully_paid_at, ?2), updated_at = ?2 \
             WHERE id = ?1 AND status = 'completed' \
               AND paid_amount_cents >= total_amount_cents",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %id, "Work order finalized");
        require_work_order(&self.pool, id).await
    }

    /// Cancels the order. Paid orders are settled history and stay put.
    pub async fn cancel(&self, id: &str) -> DbResult<WorkOrder> {
        let wo = require_work_order(&self.pool, id).await?;
        if !wo.can_be_cancelled() {
            return Err(GuardViolation::WorkOrderPaid { work_order_id: wo.id }.into());
        }

        let result = sqlx::query(
            "UPDATE work_orders SET status = 'cancelled', updated_at = ?2 \
             WHERE id = ?1 AND status != 'paid'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = require_work_order(&self.pool, id).await?;
            return Err(GuardViolation::WorkOrderPaid {
                work_order_id: fresh.id,
            }
            .into());
        }

        info!(id = %id, "Work order cancelled");
        require_work_order(&self.pool, id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::testing::{seed_service_type, seed_vehicle, test_db};

    async fn order_fixture(db: &Database) -> (WorkOrder, String) {
        let vehicle_id = seed_vehicle(db, "WRK0A01").await;
        let service = seed_service_type(db, "Brake job", 15_000).await; // 150.00
        let wo = db
            .work_orders()
            .create(NewWorkOrder {
                vehicle_id,
                author_id: "staff-1".to_string(),
                priority: None,
                notes: None,
            })
            .await
            .unwrap();
        (wo, service)
    }

    fn new_item(service_type_id: &str, quantity: i64) -> NewWorkOrderItem {
        NewWorkOrderItem {
            service_type_id: service_type_id.to_string(),
            description: None,
            quantity,
            unit_price: None,
        }
    }

    #[tokio::test]
    async fn test_direct_creation_defaults() {
        let db = test_db().await;
        let (wo, _) = order_fixture(&db).await;

        assert_eq!(wo.status, WorkOrderStatus::Open);
        assert_eq!(wo.priority, WorkOrderPriority::Normal);
        assert_eq!(wo.total_amount_cents, 0);
        assert_eq!(wo.paid_amount_cents, 0);
        assert!(wo.quote_id.is_none());
    }

    #[tokio::test]
    async fn test_item_ledger_recomputes_total() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        let it = orders.add_item(&wo.id, new_item(&service, 2)).await.unwrap();
        assert_eq!(it.total_price_cents, 30_000);

        let wo_fresh = orders.get_by_id(&wo.id).await.unwrap().unwrap();
        assert_eq!(wo_fresh.total_amount_cents, 30_000);

        let updated = orders.update_item(&it.id, 1, None).await.unwrap();
        assert_eq!(updated.total_price_cents, 15_000);
        let wo_fresh = orders.get_by_id(&wo.id).await.unwrap().unwrap();
        assert_eq!(wo_fresh.total_amount_cents, 15_000);

        // Removing the last item preserves the total rather than zeroing it.
        orders.remove_item(&it.id).await.unwrap();
        let wo_fresh = orders.get_by_id(&wo.id).await.unwrap().unwrap();
        assert_eq!(wo_fresh.total_amount_cents, 15_000);
    }

    #[tokio::test]
    async fn test_start_complete_flow() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        let it = orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();

        let started = orders.start(&wo.id).await.unwrap();
        assert_eq!(started.status, WorkOrderStatus::InProgress);
        assert!(started.started_at.is_some());

        // Starting twice is a guard violation, not a crash.
        assert!(matches!(
            orders.start(&wo.id).await,
            Err(DbError::Guard(GuardViolation::WorkOrderNotStartable { .. }))
        ));

        // Completion is blocked while items are pending.
        assert_eq!(orders.completion_percentage(&wo.id).await.unwrap(), 0);
        assert!(matches!(
            orders.complete(&wo.id).await,
            Err(DbError::Guard(GuardViolation::ItemsIncomplete { pending: 1, .. }))
        ));

        orders.set_item_completed(&it.id, true).await.unwrap();
        assert_eq!(orders.completion_percentage(&wo.id).await.unwrap(), 100);

        let completed = orders.complete(&wo.id).await.unwrap();
        assert_eq!(completed.status, WorkOrderStatus::Completed);
        assert!(completed.completed_at.is_some());
        // completed_at strictly after started_at
        assert!(completed.completed_at.unwrap() > completed.started_at.unwrap());
    }

    #[tokio::test]
    async fn test_payment_lifecycle() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        let it = orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();
        orders.start(&wo.id).await.unwrap();
        orders.set_item_completed(&it.id, true).await.unwrap();
        orders.complete(&wo.id).await.unwrap();

        // Partial payment: stays completed.
        let after_partial = orders
            .record_payment(&wo.id, Money::brl(5_000))
            .await
            .unwrap();
        assert_eq!(after_partial.status, WorkOrderStatus::Completed);
        assert_eq!(after_partial.paid_amount_cents, 5_000);
        assert!(after_partial.fully_paid_at.is_none());
        assert_eq!(after_partial.payment_percentage(), 33);

        // Paying the rest flips to paid and stamps fully_paid_at.
        let settled = orders
            .record_payment(&wo.id, Money::brl(10_000))
            .await
            .unwrap();
        assert_eq!(settled.status, WorkOrderStatus::Paid);
        assert!(settled.fully_paid());
        let first_stamp = settled.fully_paid_at.expect("fully_paid_at stamped");

        // One more centavo is rejected: it would exceed the total.
        let over = orders.record_payment(&wo.id, Money::brl(1)).await;
        assert!(matches!(
            over,
            Err(DbError::Guard(GuardViolation::PaymentExceedsTotal { .. }))
        ));

        // State unchanged by the rejected payment.
        let fresh = orders.get_by_id(&wo.id).await.unwrap().unwrap();
        assert_eq!(fresh.paid_amount_cents, 15_000);
        assert_eq!(fresh.fully_paid_at, Some(first_stamp));
    }

    #[tokio::test]
    async fn test_overpayment_rejected_atomically() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        let it = orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();
        orders.start(&wo.id).await.unwrap();
        orders.set_item_completed(&it.id, true).await.unwrap();
        orders.complete(&wo.id).await.unwrap();

        // 150.01 against a 150.00 total: rejected, nothing written.
        let result = orders.record_payment(&wo.id, Money::brl(15_001)).await;
        assert!(matches!(
            result,
            Err(DbError::Guard(GuardViolation::PaymentExceedsTotal { .. }))
        ));
        let fresh = orders.get_by_id(&wo.id).await.unwrap().unwrap();
        assert_eq!(fresh.paid_amount_cents, 0);
        assert_eq!(fresh.status, WorkOrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_payment_requires_completed_status() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;
        orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();

        assert!(matches!(
            orders.record_payment(&wo.id, Money::brl(1_000)).await,
            Err(DbError::Guard(GuardViolation::WorkOrderNotPayable { .. }))
        ));

        // Invalid amounts never reach the database.
        assert!(matches!(
            orders.record_payment(&wo.id, Money::brl(0)).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_finalize_and_pay_from_in_progress() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();
        orders.start(&wo.id).await.unwrap();

        // Items intentionally left unfinished: the counter path settles
        // everything in one step.
        let settled = orders.finalize_and_pay(&wo.id, None).await.unwrap();
        assert_eq!(settled.status, WorkOrderStatus::Paid);
        assert_eq!(settled.paid_amount_cents, 15_000);
        assert!(settled.completed_at.is_some());
        assert!(settled.fully_paid_at.is_some());
    }

    #[tokio::test]
    async fn test_finalize_partial_payment_stays_completed() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();
        orders.start(&wo.id).await.unwrap();

        let partially = orders
            .finalize_and_pay(&wo.id, Some(Money::brl(5_000)))
            .await
            .unwrap();
        assert_eq!(partially.status, WorkOrderStatus::Completed);
        assert_eq!(partially.paid_amount_cents, 5_000);
        assert!(partially.fully_paid_at.is_none());
    }

    #[tokio::test]
    async fn test_cancel_guard() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, service) = order_fixture(&db).await;

        let it = orders.add_item(&wo.id, new_item(&service, 1)).await.unwrap();
        orders.start(&wo.id).await.unwrap();
        orders.set_item_completed(&it.id, true).await.unwrap();
        orders.complete(&wo.id).await.unwrap();
        orders.record_payment(&wo.id, Money::brl(15_000)).await.unwrap();

        // Paid orders are immutable history.
        assert!(matches!(
            orders.cancel(&wo.id).await,
            Err(DbError::Guard(GuardViolation::WorkOrderPaid { .. }))
        ));

        // A fresh order cancels fine.
        let other_vehicle = seed_vehicle(&db, "WRK0B02").await;
        let other = orders
            .create(NewWorkOrder {
                vehicle_id: other_vehicle,
                author_id: "staff-1".to_string(),
                priority: Some(WorkOrderPriority::High),
                notes: None,
            })
            .await
            .unwrap();
        let cancelled = orders.cancel(&other.id).await.unwrap();
        assert_eq!(cancelled.status, WorkOrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_overdue_listing() {
        let db = test_db().await;
        let orders = db.work_orders();
        let (wo, _) = order_fixture(&db).await;

        assert!(orders.list_overdue().await.unwrap().is_empty());

        // Backdate creation past the threshold.
        sqlx::query("UPDATE work_orders SET created_at = ?2 WHERE id = ?1")
            .bind(&wo.id)
            .bind(Utc::now() - chrono::Duration::days(OVERDUE_AFTER_DAYS + 1))
            .execute(db.pool())
            .await
            .unwrap();

        let overdue = orders.list_overdue().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, wo.id);

        // Cancelled orders stop being overdue.
        orders.cancel(&wo.id).await.unwrap();
        assert!(orders.list_overdue().await.unwrap().is_empty());
    }
}
