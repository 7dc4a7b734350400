//! # Domain Types
//!
//! Core domain types for the repair-shop lifecycle.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Quote       │   │   WorkOrder     │   │ VehicleStatus   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  status         │   │  status         │   │  stage          │       │
//! │  │  expires_at     │   │  paid_amount    │   │  stay (tagged)  │       │
//! │  │  total_amount   │   │  total_amount   │   │  entered_at     │       │
//! │  └───────┬─────────┘   └───────┬─────────┘   └─────────────────┘       │
//! │          │ owns               │ owns                                   │
//! │  ┌───────▼─────────┐   ┌───────▼─────────┐   ┌─────────────────┐       │
//! │  │   QuoteItem     │   │ WorkOrderItem   │   │  ServiceType    │       │
//! │  │  quantity       │   │  quantity       │   │  default_price  │       │
//! │  │  unit_price     │   │  unit_price     │   │  active         │       │
//! │  │  total_price    │   │  completed      │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Vocabulary
//! One canonical finite set per entity. A quote's `expired` state is DERIVED
//! from `expires_at` against the caller-supplied clock, never stored; every
//! guard method takes `now` as a parameter so this crate stays pure.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Currency, Money};

// =============================================================================
// Quote Status
// =============================================================================

/// Stored status of a price quote.
///
/// `expired` is intentionally absent: it is a function of `expires_at` and
/// the current time (see [`Quote::expired`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    /// Just created, items still being added.
    New,
    /// Ready for internal review.
    Open,
    /// Delivered to the customer.
    Sent,
    /// Customer accepted; convertible to a work order.
    Approved,
    /// Customer declined.
    Rejected,
    /// Withdrawn by the shop.
    Cancelled,
}

impl QuoteStatus {
    /// Terminal statuses accept no further transitions (except that an
    /// approved quote may still be converted).
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            QuoteStatus::Approved | QuoteStatus::Rejected | QuoteStatus::Cancelled
        )
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::New => "new",
            QuoteStatus::Open => "open",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Approved => "approved",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for QuoteStatus {
    fn default() -> Self {
        QuoteStatus::New
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Work Order Status & Priority
// =============================================================================

/// Stored status of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    /// Created, work not started.
    Open,
    /// Work underway on the shop floor.
    InProgress,
    /// All line items done; awaiting payment.
    Completed,
    /// Fully paid. Final.
    Paid,
    /// Abandoned before payment.
    Cancelled,
}

impl WorkOrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "open",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Paid => "paid",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for WorkOrderStatus {
    fn default() -> Self {
        WorkOrderStatus::Open
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority of a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for WorkOrderPriority {
    fn default() -> Self {
        WorkOrderPriority::Normal
    }
}

// =============================================================================
// Vehicle Location
// =============================================================================

/// Workflow stage of a vehicle within one department.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LocationStage {
    /// Vehicle just arrived in the department.
    Entered,
    /// Queued behind other vehicles.
    Waiting,
    /// Being worked on.
    InProgress,
    /// Department work done, vehicle still parked here.
    Completed,
    /// Vehicle left the department. Only set together with a closed stay.
    Exited,
}

impl Default for LocationStage {
    fn default() -> Self {
        LocationStage::Entered
    }
}

/// Presence of a vehicle status record: either the vehicle is still in the
/// department (`Current`) or it left at a known instant (`Closed`).
///
/// This replaces a nullable `exited_at` convention with a tagged state, so
/// "current" cannot be confused with "forgot to set the timestamp".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Stay {
    /// The open record. At most one per vehicle exists at any instant.
    Current,
    /// Closed record with the exit timestamp.
    Closed {
        #[ts(as = "String")]
        exited_at: DateTime<Utc>,
    },
}

impl Stay {
    /// Maps the storage representation (nullable timestamp) into the tagged
    /// state. Used by the persistence layer when loading rows.
    pub fn from_exited_at(exited_at: Option<DateTime<Utc>>) -> Self {
        match exited_at {
            None => Stay::Current,
            Some(ts) => Stay::Closed { exited_at: ts },
        }
    }

    /// Maps back to the storage representation.
    pub fn exited_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Stay::Current => None,
            Stay::Closed { exited_at } => Some(*exited_at),
        }
    }

    pub const fn is_current(&self) -> bool {
        matches!(self, Stay::Current)
    }
}

/// One entry in a vehicle's movement history across service departments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VehicleStatus {
    pub id: String,
    pub vehicle_id: String,
    pub department_id: String,
    pub work_order_id: String,
    /// Staff member who recorded the movement. Opaque reference.
    pub author_id: String,
    pub stage: LocationStage,
    #[ts(as = "String")]
    pub entered_at: DateTime<Utc>,
    /// Current or closed. See [`Stay`].
    pub stay: Stay,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl VehicleStatus {
    /// True while the vehicle is still in this department.
    #[inline]
    pub const fn is_current(&self) -> bool {
        self.stay.is_current()
    }

    /// Time spent in the department so far (closed records use the exit
    /// stamp, open records use the supplied clock).
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.stay.exited_at().unwrap_or(now);
        end - self.entered_at
    }
}

// =============================================================================
// Quote
// =============================================================================

/// A priced service proposal for a vehicle, not yet billable.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Quote {
    pub id: String,
    pub vehicle_id: String,
    /// Staff member who wrote the quote. Opaque reference.
    pub author_id: String,
    pub status: QuoteStatus,
    /// Flat service value used as the total when no items exist.
    pub service_value_cents: i64,
    /// Derived total: sum of item totals, else `service_value_cents`.
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub currency: Currency,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub approved_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents, self.currency)
    }

    #[inline]
    pub fn service_value(&self) -> Money {
        Money::from_cents(self.service_value_cents, self.currency)
    }

    /// Pure expiry check against the supplied clock. Never stored.
    #[inline]
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// A quote can be approved while new, open or sent, and unexpired.
    pub fn can_be_approved(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            QuoteStatus::New | QuoteStatus::Open | QuoteStatus::Sent
        ) && !self.expired(now)
    }

    /// Rejection is only meaningful after the customer could have seen it.
    pub fn can_be_rejected(&self) -> bool {
        matches!(self.status, QuoteStatus::Open | QuoteStatus::Sent)
    }

    /// Sending is allowed from any non-terminal status.
    pub fn can_be_sent(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Conversion requires approval and an unexpired quote.
    pub fn can_be_converted_to_work_order(&self, now: DateTime<Utc>) -> bool {
        self.status == QuoteStatus::Approved && !self.expired(now)
    }

    /// Status label for listings: shows the derived `expired` state for
    /// quotes that lapsed before reaching a terminal status.
    pub fn status_label(&self, now: DateTime<Utc>) -> &'static str {
        if !self.status.is_terminal() && self.expired(now) {
            "expired"
        } else {
            self.status.as_str()
        }
    }
}

/// One priced service entry owned by a quote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QuoteItem {
    pub id: String,
    pub quote_id: String,
    pub service_type_id: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Always `unit_price_cents * quantity`; recomputed on every write.
    pub total_price_cents: i64,
    #[ts(as = "String")]
    pub currency: Currency,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl QuoteItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents, self.currency)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents, self.currency)
    }
}

// =============================================================================
// Work Order
// =============================================================================

/// A billable, trackable unit of service work, optionally derived from a
/// quote.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WorkOrder {
    pub id: String,
    pub vehicle_id: String,
    /// Staff member who opened the order (the converting user when derived
    /// from a quote). Opaque reference.
    pub author_id: String,
    /// Set when this order was produced by quote conversion. At most one
    /// work order ever references a given quote.
    pub quote_id: Option<String>,
    pub status: WorkOrderStatus,
    pub priority: WorkOrderPriority,
    pub total_amount_cents: i64,
    pub paid_amount_cents: i64,
    #[ts(as = "String")]
    pub currency: Currency,
    pub notes: Option<String>,
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub fully_paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents, self.currency)
    }

    #[inline]
    pub fn paid_amount(&self) -> Money {
        Money::from_cents(self.paid_amount_cents, self.currency)
    }

    /// Outstanding balance. Invariant `paid <= total` keeps this >= 0.
    #[inline]
    pub fn remaining_amount(&self) -> Money {
        Money::from_cents(
            self.total_amount_cents - self.paid_amount_cents,
            self.currency,
        )
    }

    #[inline]
    pub fn fully_paid(&self) -> bool {
        self.paid_amount_cents >= self.total_amount_cents
    }

    pub fn can_be_started(&self) -> bool {
        self.status == WorkOrderStatus::Open
    }

    pub fn can_be_cancelled(&self) -> bool {
        self.status != WorkOrderStatus::Paid
    }

    /// Payments are only recorded while completed (and not yet fully paid).
    pub fn can_be_paid(&self) -> bool {
        self.status == WorkOrderStatus::Completed && !self.fully_paid()
    }

    /// Finalize-and-pay shortcut applies to in_progress or completed orders.
    pub fn can_be_finalized(&self) -> bool {
        matches!(
            self.status,
            WorkOrderStatus::InProgress | WorkOrderStatus::Completed
        )
    }

    /// Percentage of the total already collected, rounded to the nearest
    /// whole percent. Integer math; 0 for a zero total.
    pub fn payment_percentage(&self) -> u32 {
        if self.total_amount_cents <= 0 {
            return 0;
        }
        let paid = self.paid_amount_cents.max(0) as i128;
        let total = self.total_amount_cents as i128;
        ((paid * 100 + total / 2) / total) as u32
    }

    /// Wall-clock time from start to completion, when both stamps exist.
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed - started),
            _ => None,
        }
    }
}

/// One priced service entry owned by a work order.
///
/// Same money math as [`QuoteItem`], plus the shop-floor `completed` flag
/// that feeds the work order's completion guard.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WorkOrderItem {
    pub id: String,
    pub work_order_id: String,
    pub service_type_id: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
    #[ts(as = "String")]
    pub currency: Currency,
    pub completed: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl WorkOrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents, self.currency)
    }

    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.total_price_cents, self.currency)
    }
}

// =============================================================================
// Catalogs
// =============================================================================

/// A service offered by the shop, with its default price.
///
/// Read-only from the lifecycle core's point of view: the ledger consults
/// `default_price` when an item is added without an explicit unit price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub default_price_cents: i64,
    #[ts(as = "String")]
    pub currency: Currency,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ServiceType {
    #[inline]
    pub fn default_price(&self) -> Money {
        Money::from_cents(self.default_price_cents, self.currency)
    }
}

/// A physical service department vehicles move through.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Minimal vehicle record. Brand/model reference data and customer linkage
/// live outside this core; the lifecycle only needs a stable id and plate.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Vehicle {
    pub id: String,
    /// Normalized: uppercase, alphanumeric only.
    pub license_plate: String,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample_quote(status: QuoteStatus, expires_at: DateTime<Utc>) -> Quote {
        Quote {
            id: "q-1".to_string(),
            vehicle_id: "v-1".to_string(),
            author_id: "u-1".to_string(),
            status,
            service_value_cents: 0,
            total_amount_cents: 15_000,
            currency: Currency::BRL,
            notes: None,
            expires_at,
            approved_at: None,
            created_at: t(0),
            updated_at: t(0),
        }
    }

    fn sample_work_order(status: WorkOrderStatus, total: i64, paid: i64) -> WorkOrder {
        WorkOrder {
            id: "wo-1".to_string(),
            vehicle_id: "v-1".to_string(),
            author_id: "u-1".to_string(),
            quote_id: None,
            status,
            priority: WorkOrderPriority::Normal,
            total_amount_cents: total,
            paid_amount_cents: paid,
            currency: Currency::BRL,
            notes: None,
            started_at: None,
            completed_at: None,
            fully_paid_at: None,
            created_at: t(0),
            updated_at: t(0),
        }
    }

    #[test]
    fn test_quote_expiry_is_derived() {
        let quote = sample_quote(QuoteStatus::Sent, t(1_000));
        assert!(!quote.expired(t(999)));
        assert!(quote.expired(t(1_001)));
        assert_eq!(quote.status_label(t(999)), "sent");
        assert_eq!(quote.status_label(t(1_001)), "expired");
    }

    #[test]
    fn test_quote_approval_guard() {
        let now = t(500);
        for status in [QuoteStatus::New, QuoteStatus::Open, QuoteStatus::Sent] {
            assert!(sample_quote(status, t(1_000)).can_be_approved(now));
        }
        for status in [
            QuoteStatus::Approved,
            QuoteStatus::Rejected,
            QuoteStatus::Cancelled,
        ] {
            assert!(!sample_quote(status, t(1_000)).can_be_approved(now));
        }
        // Expired quotes cannot be approved regardless of status.
        assert!(!sample_quote(QuoteStatus::Sent, t(100)).can_be_approved(now));
    }

    #[test]
    fn test_quote_conversion_guard() {
        let now = t(500);
        assert!(sample_quote(QuoteStatus::Approved, t(1_000)).can_be_converted_to_work_order(now));
        assert!(!sample_quote(QuoteStatus::Approved, t(100)).can_be_converted_to_work_order(now));
        assert!(!sample_quote(QuoteStatus::Sent, t(1_000)).can_be_converted_to_work_order(now));
    }

    #[test]
    fn test_terminal_label_beats_expiry() {
        // A rejected quote whose expiry passed stays "rejected" in listings.
        let quote = sample_quote(QuoteStatus::Rejected, t(100));
        assert_eq!(quote.status_label(t(1_000)), "rejected");
    }

    #[test]
    fn test_work_order_payment_math() {
        let wo = sample_work_order(WorkOrderStatus::Completed, 15_000, 5_000);
        assert_eq!(wo.remaining_amount().cents(), 10_000);
        assert!(!wo.fully_paid());
        assert!(wo.can_be_paid());
        assert_eq!(wo.payment_percentage(), 33);

        let paid = sample_work_order(WorkOrderStatus::Paid, 15_000, 15_000);
        assert!(paid.fully_paid());
        assert!(!paid.can_be_cancelled());
        assert_eq!(paid.payment_percentage(), 100);
    }

    #[test]
    fn test_payment_percentage_zero_total() {
        let wo = sample_work_order(WorkOrderStatus::Open, 0, 0);
        assert_eq!(wo.payment_percentage(), 0);
    }

    #[test]
    fn test_stay_round_trip() {
        assert!(Stay::from_exited_at(None).is_current());
        let closed = Stay::from_exited_at(Some(t(42)));
        assert!(!closed.is_current());
        assert_eq!(closed.exited_at(), Some(t(42)));
    }

    #[test]
    fn test_vehicle_status_duration() {
        let status = VehicleStatus {
            id: "vs-1".to_string(),
            vehicle_id: "v-1".to_string(),
            department_id: "d-1".to_string(),
            work_order_id: "wo-1".to_string(),
            author_id: "u-1".to_string(),
            stage: LocationStage::Entered,
            entered_at: t(100),
            stay: Stay::Current,
            notes: None,
            created_at: t(100),
            updated_at: t(100),
        };
        // Open stay measures against the supplied clock.
        assert_eq!(status.duration(t(160)).num_seconds(), 60);

        let closed = VehicleStatus {
            stay: Stay::Closed { exited_at: t(130) },
            ..status
        };
        assert_eq!(closed.duration(t(9_999)).num_seconds(), 30);
    }
}
