//! # Quote Repository
//!
//! Database operations for quotes, their line items and the quote →
//! work-order converter.
//!
//! ## Quote Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Quote Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create() → Quote { status: New, expires_at: +30 days }        │
//! │                                                                         │
//! │  2. BUILD THE LEDGER                                                   │
//! │     └── add_item() → QuoteItem (price falls back to the catalog)      │
//! │     └── every item write recomputes total_amount in-transaction       │
//! │                                                                         │
//! │  3. SEND / DECIDE                                                      │
//! │     └── send() → Sent                                                  │
//! │     └── approve() → Approved (idempotent)   reject() → Rejected       │
//! │                                                                         │
//! │  4. CONVERT                                                            │
//! │     └── convert_to_work_order() → WorkOrder (atomic, idempotent)      │
//! │                                                                         │
//! │  `expired` is never a stored status: it is derived from expires_at    │
//! │  both in Rust guards and in the SQL WHERE clauses below.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transition Mechanics
//! Guards are evaluated twice: once in Rust for a precise error message,
//! and once inside the UPDATE's WHERE clause so a concurrent writer cannot
//! slip a transition in between. `rows_affected() == 0` means we lost that
//! race; the row is re-read and the failure reported from fresh state.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Executor, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use oficina_core::validation::{validate_expires_at, validate_quantity, validate_unit_price};
use oficina_core::{
    ledger, Currency, GuardViolation, Money, Quote, QuoteItem, QuoteStatus, WorkOrder,
    WorkOrderPriority, WorkOrderStatus, DEFAULT_QUOTE_VALIDITY_DAYS,
};

// =============================================================================
// Input & Outcome Types
// =============================================================================

/// Input for a new quote.
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub vehicle_id: String,
    /// Staff member writing the quote.
    pub author_id: String,
    /// Flat value used as the total until line items exist.
    pub service_value: Option<Money>,
    pub notes: Option<String>,
    /// Defaults to 30 days from creation. Must be strictly future.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Input for a new quote line item.
#[derive(Debug, Clone)]
pub struct NewQuoteItem {
    pub service_type_id: String,
    pub description: Option<String>,
    pub quantity: i64,
    /// Omitted or zero falls back to the service type's catalog price.
    pub unit_price: Option<Money>,
}

/// Outcome of [`QuoteRepository::approve`].
///
/// Approval is idempotent: approving an already-approved quote is reported
/// as `AlreadyApproved`, not as an error.
#[derive(Debug, Clone)]
pub enum Approval {
    Approved(Quote),
    AlreadyApproved(Quote),
}

impl Approval {
    /// The quote in its post-operation state, whichever branch was taken.
    pub fn quote(&self) -> &Quote {
        match self {
            Approval::Approved(q) | Approval::AlreadyApproved(q) => q,
        }
    }
}

// =============================================================================
// Row Fetch Helpers
// =============================================================================

const QUOTE_COLUMNS: &str = "id, vehicle_id, author_id, status, service_value_cents, \
     total_amount_cents, currency, notes, expires_at, approved_at, created_at, updated_at";

const QUOTE_ITEM_COLUMNS: &str = "id, quote_id, service_type_id, description, quantity, \
     unit_price_cents, total_price_cents, currency, created_at, updated_at";

async fn fetch_quote<'e, E>(ex: E, id: &str) -> DbResult<Option<Quote>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let quote = sqlx::query_as::<_, Quote>(&format!(
        "SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(quote)
}

async fn require_quote<'e, E>(ex: E, id: &str) -> DbResult<Quote>
where
    E: Executor<'e, Database = Sqlite>,
{
    fetch_quote(ex, id)
        .await?
        .ok_or_else(|| DbError::not_found("Quote", id))
}

async fn fetch_items<'e, E>(ex: E, quote_id: &str) -> DbResult<Vec<QuoteItem>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let items = sqlx::query_as::<_, QuoteItem>(&format!(
        "SELECT {QUOTE_ITEM_COLUMNS} FROM quote_items WHERE quote_id = ?1 ORDER BY created_at"
    ))
    .bind(quote_id)
    .fetch_all(ex)
    .await?;
    Ok(items)
}

/// Recomputes and persists the quote's total from its current items.
///
/// Invoked after EVERY item mutation, inside the same transaction, so
/// callers never observe a stale total.
async fn recompute_quote_total(tx: &mut Transaction<'_, Sqlite>, quote_id: &str) -> DbResult<Money> {
    let quote = require_quote(&mut **tx, quote_id).await?;
    let items = fetch_items(&mut **tx, quote_id).await?;

    let total = ledger::quote_total(&items, quote.service_value())?;
    let total = ledger::validate_stored_total(total)?;

    sqlx::query("UPDATE quotes SET total_amount_cents = ?2, updated_at = ?3 WHERE id = ?1")
        .bind(quote_id)
        .bind(total.cents())
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

    Ok(total)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for quote database operations.
#[derive(Debug, Clone)]
pub struct QuoteRepository {
    pool: SqlitePool,
}

impl QuoteRepository {
    /// Creates a new QuoteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QuoteRepository { pool }
    }

    // -------------------------------------------------------------------------
    // CRUD
    // -------------------------------------------------------------------------

    /// Creates a new quote in status `new`.
    ///
    /// `expires_at` defaults to 30 days out and must be strictly future.
    /// The total starts as the service value (no items yet), which itself
    /// defaults to zero money.
    pub async fn create(&self, new: NewQuote) -> DbResult<Quote> {
        let now = Utc::now();
        let expires_at = new
            .expires_at
            .unwrap_or_else(|| now + Duration::days(DEFAULT_QUOTE_VALIDITY_DAYS));
        validate_expires_at(expires_at, now)?;

        let service_value = new.service_value.unwrap_or_else(|| Money::zero(Currency::BRL));
        ledger::validate_stored_total(service_value)?;

        let quote = Quote {
            id: Uuid::new_v4().to_string(),
            vehicle_id: new.vehicle_id,
            author_id: new.author_id,
            status: QuoteStatus::New,
            service_value_cents: service_value.cents(),
            total_amount_cents: service_value.cents(),
            currency: service_value.currency(),
            notes: new.notes,
            expires_at,
            approved_at: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %quote.id, vehicle_id = %quote.vehicle_id, "Creating quote");

        sqlx::query(
            r#"
            INSERT INTO quotes (
                id, vehicle_id, author_id, status, service_value_cents,
                total_amount_cents, currency, notes, expires_at, approved_at,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&quote.id)
        .bind(&quote.vehicle_id)
        .bind(&quote.author_id)
        .bind(quote.status)
        .bind(quote.service_value_cents)
        .bind(quote.total_amount_cents)
        .bind(quote.currency)
        .bind(&quote.notes)
        .bind(quote.expires_at)
        .bind(quote.approved_at)
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(quote)
    }

    /// Gets a quote by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Quote>> {
        fetch_quote(&self.pool, id).await
    }

    /// Lists all quotes, newest first.
    pub async fn list(&self) -> DbResult<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(quotes)
    }

    /// Lists quotes with a given stored status, newest first.
    pub async fn list_by_status(&self, status: QuoteStatus) -> DbResult<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE status = ?1 ORDER BY created_at DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(quotes)
    }

    /// Lists quotes for a vehicle, newest first.
    pub async fn list_by_vehicle(&self, vehicle_id: &str) -> DbResult<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes WHERE vehicle_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quotes)
    }

    /// Lists workable quotes: not rejected, not cancelled, not past expiry.
    /// The expiry filter is the derived-state rule applied in SQL.
    pub async fn list_active(&self) -> DbResult<Vec<Quote>> {
        let quotes = sqlx::query_as::<_, Quote>(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes \
             WHERE status NOT IN ('rejected', 'cancelled') AND expires_at > ?1 \
             ORDER BY created_at DESC"
        ))
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;
        Ok(quotes)
    }

    /// Deletes a quote. Items cascade; a quote referenced by a work order is
    /// protected by the schema and the delete fails with a FK violation.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM quotes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Quote", id));
        }
        info!(id = %id, "Quote deleted");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Line Items (the ledger)
    // -------------------------------------------------------------------------

    /// Gets all items for a quote.
    pub async fn get_items(&self, quote_id: &str) -> DbResult<Vec<QuoteItem>> {
        fetch_items(&self.pool, quote_id).await
    }

    /// Adds a line item and synchronously recomputes the quote total.
    ///
    /// An omitted or zero unit price falls back to the service type's
    /// catalog price. Quantity and the effective price must be positive.
    pub async fn add_item(&self, quote_id: &str, new: NewQuoteItem) -> DbResult<QuoteItem> {
        validate_quantity(new.quantity)?;

        let mut tx = self.pool.begin().await?;

        let quote = require_quote(&mut *tx, quote_id).await?;

        let catalog_price: Option<(i64, Currency)> = sqlx::query_as(
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
        // Items must share their owner's currency: reject before writing.
        Money::zero(quote.currency).checked_add(unit_price)?;

        let now = Utc::now();
        let item = QuoteItem {
            id: Uuid::new_v4().to_string(),
            quote_id: quote.id.clone(),
            service_type_id: new.service_type_id,
            description: new.description,
            quantity: new.quantity,
            unit_price_cents: unit_price.cents(),
            total_price_cents: ledger::line_total(unit_price, new.quantity).cents(),
            currency: quote.currency,
            created_at: now,
            updated_at: now,
        };

        debug!(quote_id = %quote.id, service_type_id = %item.service_type_id, "Adding quote item");

        sqlx::query(
            r#"
            INSERT INTO quote_items (
                id, quote_id, service_type_id, description, quantity,
                unit_price_cents, total_price_cents, currency, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.quote_id)
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

        recompute_quote_total(&mut tx, &item.quote_id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Updates an item's quantity (and optionally its unit price), then
    /// recomputes the stored line total and the quote total. The line total
    /// is always derived here, never trusted from input.
    pub async fn update_item(
        &self,
        item_id: &str,
        quantity: i64,
        unit_price: Option<Money>,
    ) -> DbResult<QuoteItem> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, QuoteItem>(&format!(
            "SELECT {QUOTE_ITEM_COLUMNS} FROM quote_items WHERE id = ?1"
        ))
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("QuoteItem", item_id))?;

        let unit_price = ledger::resolve_unit_price(unit_price, existing.unit_price());
        validate_unit_price(unit_price)?;
        Money::zero(existing.currency).checked_add(unit_price)?;

        let total_price = ledger::line_total(unit_price, quantity);
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE quote_items SET
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

        recompute_quote_total(&mut tx, &existing.quote_id).await?;
        tx.commit().await?;

        Ok(QuoteItem {
            quantity,
            unit_price_cents: unit_price.cents(),
            total_price_cents: total_price.cents(),
            updated_at: now,
            ..existing
        })
    }

    /// Removes an item and recomputes the quote total (falling back to the
    /// service value once the last item is gone).
    pub async fn remove_item(&self, item_id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let quote_id: Option<String> =
            sqlx::query_scalar("SELECT quote_id FROM quote_items WHERE id = ?1")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;
        let quote_id = quote_id.ok_or_else(|| DbError::not_found("QuoteItem", item_id))?;

        sqlx::query("DELETE FROM quote_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        recompute_quote_total(&mut tx, &quote_id).await?;
        tx.commit().await?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Status Transitions
    // -------------------------------------------------------------------------

    /// Moves a freshly created quote into the internal review pile.
    pub async fn mark_open(&self, id: &str) -> DbResult<Quote> {
        let quote = require_quote(&self.pool, id).await?;
        if quote.status != QuoteStatus::New {
            return Err(GuardViolation::QuoteNotSendable {
                quote_id: quote.id,
                status: quote.status.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE quotes SET status = 'open', updated_at = ?2 WHERE id = ?1 AND status = 'new'",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = require_quote(&self.pool, id).await?;
            return Err(GuardViolation::QuoteNotSendable {
                quote_id: fresh.id,
                status: fresh.status.to_string(),
            }
            .into());
        }
        require_quote(&self.pool, id).await
    }

    /// Marks the quote as delivered to the customer. Allowed from any
    /// non-terminal status.
    pub async fn send(&self, id: &str) -> DbResult<Quote> {
        let quote = require_quote(&self.pool, id).await?;
        if !quote.can_be_sent() {
            return Err(GuardViolation::QuoteNotSendable {
                quote_id: quote.id,
                status: quote.status.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE quotes SET status = 'sent', updated_at = ?2 \
             WHERE id = ?1 AND status IN ('new', 'open', 'sent')",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = require_quote(&self.pool, id).await?;
            return Err(GuardViolation::QuoteNotSendable {
                quote_id: fresh.id,
                status: fresh.status.to_string(),
            }
            .into());
        }
        require_quote(&self.pool, id).await
    }

    /// Approves the quote and stamps `approved_at`.
    ///
    /// Idempotent: a second call on an approved quote reports
    /// [`Approval::AlreadyApproved`] without error. Expired quotes are
    /// rejected both here and inside the UPDATE's WHERE clause, so a quote
    /// that expires mid-request cannot be approved.
    pub async fn approve(&self, id: &str) -> DbResult<Approval> {
        let now = Utc::now();
        let quote = require_quote(&self.pool, id).await?;

        if quote.status == QuoteStatus::Approved {
            info!(id = %id, "Quote already approved");
            return Ok(Approval::AlreadyApproved(quote));
        }
        if quote.expired(now) {
            return Err(GuardViolation::QuoteExpired { quote_id: quote.id }.into());
        }
        if !quote.can_be_approved(now) {
            return Err(GuardViolation::QuoteNotApprovable {
                quote_id: quote.id,
                status: quote.status.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE quotes SET status = 'approved', approved_at = ?2, updated_at = ?2 \
             WHERE id = ?1 AND status IN ('new', 'open', 'sent') AND expires_at > ?2",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Raced: someone else transitioned the quote first.
            let fresh = require_quote(&self.pool, id).await?;
            if fresh.status == QuoteStatus::Approved {
                return Ok(Approval::AlreadyApproved(fresh));
            }
            if fresh.expired(now) {
                return Err(GuardViolation::QuoteExpired { quote_id: fresh.id }.into());
            }
            return Err(GuardViolation::QuoteNotApprovable {
                quote_id: fresh.id,
                status: fresh.status.to_string(),
            }
            .into());
        }

        info!(id = %id, "Quote approved");
        require_quote(&self.pool, id).await.map(Approval::Approved)
    }

    /// Rejects an open or sent quote.
    pub async fn reject(&self, id: &str) -> DbResult<Quote> {
        let quote = require_quote(&self.pool, id).await?;
        if !quote.can_be_rejected() {
            return Err(GuardViolation::QuoteNotRejectable {
                quote_id: quote.id,
                status: quote.status.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE quotes SET status = 'rejected', updated_at = ?2 \
             WHERE id = ?1 AND status IN ('open', 'sent')",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let fresh = require_quote(&self.pool, id).await?;
            return Err(GuardViolation::QuoteNotRejectable {
                quote_id: fresh.id,
                status: fresh.status.to_string(),
            }
            .into());
        }
        require_quote(&self.pool, id).await
    }

    /// Cancels the quote. Allowed from any status as long as no work order
    /// was produced from it.
    pub async fn cancel(&self, id: &str) -> DbResult<Quote> {
        let mut tx = self.pool.begin().await?;

        let quote = require_quote(&mut *tx, id).await?;

        let work_order_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM work_orders WHERE quote_id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if let Some(work_order_id) = work_order_id {
            return Err(GuardViolation::QuoteConverted {
                quote_id: quote.id,
                work_order_id,
            }
            .into());
        }

        sqlx::query("UPDATE quotes SET status = 'cancelled', updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(id = %id, "Quote cancelled");
        require_quote(&self.pool, id).await
    }

    // -------------------------------------------------------------------------
    // Quote → Work Order Converter
    // -------------------------------------------------------------------------

    /// Converts an approved quote into a work order.
    ///
    /// ## Algorithm (single transaction)
    /// 1. A work order already referencing the quote is returned unchanged
    /// 2. Guard: quote must be approved and unexpired
    /// 3. Insert the work order (totals copied, paid 0, open, normal)
    /// 4. Copy every quote item with `completed = false`
    /// 5. Recompute the work-order total from the copied items
    ///
    /// Safe to retry and safe under concurrency: the partial unique index on
    /// `work_orders.quote_id` turns a double-convert race into a UNIQUE
    /// violation for the loser, which is resolved by returning the winner's
    /// work order.
    pub async fn convert_to_work_order(
        &self,
        quote_id: &str,
        converting_user: &str,
    ) -> DbResult<WorkOrder> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // 1. Idempotence: at most one work order per quote, ever.
        if let Some(existing) = fetch_work_order_by_quote(&mut *tx, quote_id).await? {
            info!(quote_id = %quote_id, work_order_id = %existing.id, "Quote already converted");
            return Ok(existing);
        }

        // 2. Guards.
        let quote = require_quote(&mut *tx, quote_id).await?;
        if quote.expired(now) {
            return Err(GuardViolation::QuoteExpired { quote_id: quote.id }.into());
        }
        if !quote.can_be_converted_to_work_order(now) {
            return Err(GuardViolation::QuoteNotConvertible {
                quote_id: quote.id,
                status: quote.status.to_string(),
            }
            .into());
        }

        // 3. Work order shell with the quote's total copied over. It stands
        //    in until the items land a few statements below.
        let work_order_id = Uuid::new_v4().to_string();
        let insert = sqlx::query(
            r#"
            INSERT INTO work_orders (
                id, vehicle_id, author_id, quote_id, status, priority,
                total_amount_cents, paid_amount_cents, currency, notes,
                started_at, completed_at, fully_paid_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, NULL, NULL, NULL, ?10, ?10)
            "#,
        )
        .bind(&work_order_id)
        .bind(&quote.vehicle_id)
        .bind(converting_user)
        .bind(&quote.id)
        .bind(WorkOrderStatus::Open)
        .bind(WorkOrderPriority::Normal)
        .bind(quote.total_amount_cents)
        .bind(quote.currency)
        .bind(format!("Converted from quote {}", quote.id))
        .bind(now)
        .execute(&mut *tx)
        .await;

        if let Err(err) = insert {
            let db_err = DbError::from(err);
            if matches!(&db_err, DbError::UniqueViolation { field } if field.contains("quote_id")) {
                // Lost a concurrent conversion race. Nothing we wrote
                // survives the rollback; hand back the winner's work order.
                drop(tx);
                if let Some(existing) = fetch_work_order_by_quote(&self.pool, quote_id).await? {
                    info!(quote_id = %quote_id, work_order_id = %existing.id,
                          "Concurrent conversion detected, returning existing work order");
                    return Ok(existing);
                }
            }
            return Err(db_err);
        }

        // 4. Copy the ledger. Identical quantity/prices/service type, fresh
        //    ids, nothing completed yet.
        let items = fetch_items(&mut *tx, &quote.id).await?;
        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO work_order_items (
                    id, work_order_id, service_type_id, description, quantity,
                    unit_price_cents, total_price_cents, currency, completed,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&work_order_id)
            .bind(&item.service_type_id)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.total_price_cents)
            .bind(item.currency)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // 5. Once items exist the total derives from them, overwriting the
        //    value copied in step 3.
        if !items.is_empty() {
            let total: i64 = items.iter().map(|i| i.total_price_cents).sum();
            sqlx::query(
                "UPDATE work_orders SET total_amount_cents = ?2, updated_at = ?3 WHERE id = ?1",
            )
            .bind(&work_order_id)
            .bind(total)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let work_order = fetch_work_order_by_quote(&mut *tx, quote_id)
            .await?
            .ok_or_else(|| DbError::consistency("work order vanished inside conversion"))?;

        tx.commit().await?;

        info!(quote_id = %quote_id, work_order_id = %work_order.id, items = items.len(),
              "Quote converted to work order");
        Ok(work_order)
    }
}

const WORK_ORDER_COLUMNS: &str = "id, vehicle_id, author_id, quote_id, status, priority, \
     total_amount_cents, paid_amount_cents, currency, notes, started_at, completed_at, \
     fully_paid_at, created_at, updated_at";

async fn fetch_work_order_by_quote<'e, E>(ex: E, quote_id: &str) -> DbResult<Option<WorkOrder>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let wo = sqlx::query_as::<_, WorkOrder>(&format!(
        "SELECT {WORK_ORDER_COLUMNS} FROM work_orders WHERE quote_id = ?1"
    ))
    .bind(quote_id)
    .fetch_optional(ex)
    .await?;
    Ok(wo)
}

// =============================================================================
// Unit Tests
// =============================================================================
