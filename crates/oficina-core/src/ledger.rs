//! # Line-Item Ledger Math
//!
//! Pure calculations for the priced line items attached to quotes and work
//! orders. The persistence layer calls these after every item mutation and
//! immediately writes the result back, so owner totals are never stale.
//!
//! ## Total Derivation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Owner Total Derivation                             │
//! │                                                                         │
//! │  Quote:                                                                 │
//! │    items exist?  ──yes──► total = Σ item.total_price                   │
//! │         │                                                               │
//! │         no ──────────────► total = service_value (flat quote)          │
//! │                                                                         │
//! │  WorkOrder:                                                             │
//! │    items exist?  ──yes──► total = Σ item.total_price                   │
//! │         │                                                               │
//! │         no ──────────────► total preserved as-is                       │
//! │                            (conversion copies the quote total first,   │
//! │                             items arrive in the same transaction)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every item obeys `total_price == unit_price * quantity`. The value is
//! recomputed here on each write, never trusted from input.

use chrono::Duration;

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::types::{QuoteItem, Stay, VehicleStatus, WorkOrderItem};

// =============================================================================
// Item Math
// =============================================================================

/// The line-item law: `total = unit_price * quantity`.
#[inline]
pub fn line_total(unit_price: Money, quantity: i64) -> Money {
    unit_price.multiply_quantity(quantity)
}

/// Picks the effective unit price for a new item.
///
/// An omitted or zero price falls back to the service type's catalog price.
/// An explicit non-zero price wins.
pub fn resolve_unit_price(explicit: Option<Money>, catalog_default: Money) -> Money {
    match explicit {
        Some(price) if !price.is_zero() => price,
        _ => catalog_default,
    }
}

/// Sums a set of same-currency amounts starting from zero in `currency`.
///
/// A mixed-currency set is a `ValidationError`, never a silent sum.
pub fn sum_totals(
    totals: impl IntoIterator<Item = Money>,
    currency: crate::money::Currency,
) -> ValidationResult<Money> {
    let mut acc = Money::zero(currency);
    for total in totals {
        acc = acc.checked_add(total)?;
    }
    Ok(acc)
}

// =============================================================================
// Owner Totals
// =============================================================================

/// Derived total for a quote: item sum when items exist, otherwise the flat
/// service value. Never negative for valid inputs, never null.
pub fn quote_total(items: &[QuoteItem], service_value: Money) -> ValidationResult<Money> {
    if items.is_empty() {
        return Ok(service_value);
    }
    sum_totals(items.iter().map(QuoteItem::total_price), service_value.currency())
}

/// Derived total for a work order: item sum when items exist, otherwise the
/// current total preserved unchanged (the post-conversion window where the
/// copied quote total stands in until items are copied).
pub fn work_order_total(items: &[WorkOrderItem], current: Money) -> ValidationResult<Money> {
    if items.is_empty() {
        return Ok(current);
    }
    sum_totals(items.iter().map(WorkOrderItem::total_price), current.currency())
}

/// A stored total must not be negative.
pub fn validate_stored_total(total: Money) -> ValidationResult<Money> {
    if total.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "total_amount".to_string(),
        });
    }
    Ok(total)
}

// =============================================================================
// Completion Tracking
// =============================================================================

/// True when every item is marked completed. Vacuously true for no items;
/// the work-order completion guard checks emptiness separately.
pub fn all_items_completed(items: &[WorkOrderItem]) -> bool {
    items.iter().all(|item| item.completed)
}

/// Number of items still unfinished.
pub fn pending_items(items: &[WorkOrderItem]) -> i64 {
    items.iter().filter(|item| !item.completed).count() as i64
}

/// Completed items as a rounded whole percentage. 0 when there are no items.
pub fn completion_percentage(items: &[WorkOrderItem]) -> u32 {
    if items.is_empty() {
        return 0;
    }
    let done = items.iter().filter(|item| item.completed).count() as u64;
    let total = items.len() as u64;
    ((done * 100 + total / 2) / total) as u32
}

// =============================================================================
// Dwell-Time Aggregation
// =============================================================================

/// Average time vehicles spent in a department, over CLOSED stays only.
/// Open stays are excluded so a parked vehicle doesn't skew the figure.
/// Returns `None` when there is no closed stay to average.
pub fn average_stay(statuses: &[VehicleStatus]) -> Option<Duration> {
    let mut total = Duration::zero();
    let mut count: i32 = 0;
    for status in statuses {
        if let Stay::Closed { exited_at } = status.stay {
            total = total + (exited_at - status.entered_at);
            count += 1;
        }
    }
    if count == 0 {
        None
    } else {
        Some(total / count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use crate::types::LocationStage;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn quote_item(cents: i64, qty: i64) -> QuoteItem {
        QuoteItem {
            id: "qi".to_string(),
            quote_id: "q-1".to_string(),
            service_type_id: "st-1".to_string(),
            description: None,
            quantity: qty,
            unit_price_cents: cents,
            total_price_cents: cents * qty,
            currency: Currency::BRL,
            created_at: t(0),
            updated_at: t(0),
        }
    }

    fn wo_item(cents: i64, completed: bool) -> WorkOrderItem {
        WorkOrderItem {
            id: "wi".to_string(),
            work_order_id: "wo-1".to_string(),
            service_type_id: "st-1".to_string(),
            description: None,
            quantity: 1,
            unit_price_cents: cents,
            total_price_cents: cents,
            currency: Currency::BRL,
            completed,
            created_at: t(0),
            updated_at: t(0),
        }
    }

    #[test]
    fn test_line_total_law() {
        assert_eq!(line_total(Money::brl(2_599), 3).cents(), 7_797);
        assert_eq!(line_total(Money::brl(100), 0).cents(), 0);
    }

    #[test]
    fn test_resolve_unit_price_fallback() {
        let catalog = Money::brl(8_000);
        assert_eq!(resolve_unit_price(None, catalog).cents(), 8_000);
        assert_eq!(resolve_unit_price(Some(Money::brl(0)), catalog).cents(), 8_000);
        assert_eq!(resolve_unit_price(Some(Money::brl(9_500)), catalog).cents(), 9_500);
    }

    #[test]
    fn test_quote_total_sums_items() {
        // 100.00 + 50.00 BRL => 150.00 BRL
        let items = vec![quote_item(10_000, 1), quote_item(5_000, 1)];
        let total = quote_total(&items, Money::brl(0)).unwrap();
        assert_eq!(total.cents(), 15_000);
        assert_eq!(total.currency(), Currency::BRL);
    }

    #[test]
    fn test_quote_total_falls_back_to_service_value() {
        let total = quote_total(&[], Money::brl(7_500)).unwrap();
        assert_eq!(total.cents(), 7_500);
    }

    #[test]
    fn test_work_order_total_preserved_without_items() {
        let total = work_order_total(&[], Money::brl(15_000)).unwrap();
        assert_eq!(total.cents(), 15_000);

        let items = vec![wo_item(4_000, false), wo_item(2_000, true)];
        let total = work_order_total(&items, Money::brl(15_000)).unwrap();
        assert_eq!(total.cents(), 6_000);
    }

    #[test]
    fn test_completion_percentage() {
        assert_eq!(completion_percentage(&[]), 0);

        let items = vec![wo_item(100, true), wo_item(100, false), wo_item(100, false)];
        assert_eq!(completion_percentage(&items), 33);
        assert_eq!(pending_items(&items), 2);
        assert!(!all_items_completed(&items));

        let done = vec![wo_item(100, true), wo_item(100, true)];
        assert_eq!(completion_percentage(&done), 100);
        assert!(all_items_completed(&done));
    }

    #[test]
    fn test_validate_stored_total_rejects_negative() {
        assert!(validate_stored_total(Money::brl(-1)).is_err());
        assert!(validate_stored_total(Money::brl(0)).is_ok());
    }

    fn stay_record(entered: i64, exited: Option<i64>) -> VehicleStatus {
        VehicleStatus {
            id: "vs".to_string(),
            vehicle_id: "v-1".to_string(),
            department_id: "d-1".to_string(),
            work_order_id: "wo-1".to_string(),
            author_id: "u-1".to_string(),
            stage: LocationStage::Entered,
            entered_at: t(entered),
            stay: Stay::from_exited_at(exited.map(t)),
            notes: None,
            created_at: t(entered),
            updated_at: t(entered),
        }
    }

    #[test]
    fn test_average_stay_ignores_open_records() {
        let history = vec![
            stay_record(0, Some(60)),
            stay_record(100, Some(140)),
            stay_record(200, None), // still in the department
        ];
        let avg = average_stay(&history).unwrap();
        assert_eq!(avg.num_seconds(), 50);

        assert!(average_stay(&[stay_record(0, None)]).is_none());
    }
}
