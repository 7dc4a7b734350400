//! # Error Types
//!
//! Domain-specific error types for oficina-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  oficina-core errors (this file)                                       │
//! │  ├── ValidationError  - Field-level input failures                     │
//! │  └── GuardViolation   - Illegal lifecycle transitions (soft failures)  │
//! │                                                                         │
//! │  oficina-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures + wrapped domain failures     │
//! │                                                                         │
//! │  Flow: ValidationError / GuardViolation → DbError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, current status)
//! 3. Errors are enum variants, never String
//! 4. Guard failures are expected outcomes the caller checks and surfaces
//!    to the user; they never abort the process

use thiserror::Error;

// =============================================================================
// Validation Error
// =============================================================================

/// Field-level input validation errors.
///
/// These occur when input doesn't meet requirements. They are collected at
/// the operation boundary and returned to the caller, never thrown as
/// process-fatal errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Timestamp must be strictly in the future.
    #[error("{field} must be a future date")]
    MustBeFuture { field: String },

    /// Invalid format (bad currency code, malformed decimal, bad plate).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two monetary values with different currency tags were combined.
    #[error("currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Guard Violation
// =============================================================================

/// An illegal lifecycle transition.
///
/// These are SOFT failures: staff clicked "approve" on an expired quote,
/// or tried to collect more than the remaining balance. The operation
/// leaves state unchanged and the caller shows the message to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardViolation {
    /// Quote expiry date has passed; approval and conversion are closed.
    #[error("quote {quote_id} has expired")]
    QuoteExpired { quote_id: String },

    /// Quote is not in a status that allows approval.
    #[error("quote {quote_id} is {status}, cannot approve")]
    QuoteNotApprovable { quote_id: String, status: String },

    /// Quote can only be rejected while open or sent.
    #[error("quote {quote_id} is {status}, cannot reject")]
    QuoteNotRejectable { quote_id: String, status: String },

    /// Quote reached a terminal status; sending is closed.
    #[error("quote {quote_id} is {status}, cannot send")]
    QuoteNotSendable { quote_id: String, status: String },

    /// A work order already references this quote; cancelling would orphan it.
    #[error("quote {quote_id} was converted to work order {work_order_id}, cannot cancel")]
    QuoteConverted {
        quote_id: String,
        work_order_id: String,
    },

    /// Conversion requires an approved, unexpired quote.
    #[error("quote {quote_id} is {status}, cannot convert to a work order")]
    QuoteNotConvertible { quote_id: String, status: String },

    /// Work order can only be started from `open`.
    #[error("work order {work_order_id} is {status}, cannot start")]
    WorkOrderNotStartable {
        work_order_id: String,
        status: String,
    },

    /// Work order can only be completed from `in_progress`.
    #[error("work order {work_order_id} is {status}, cannot complete")]
    WorkOrderNotCompletable {
        work_order_id: String,
        status: String,
    },

    /// Completion requires every line item to be marked completed.
    #[error("work order {work_order_id} has {pending} unfinished item(s)")]
    ItemsIncomplete {
        work_order_id: String,
        pending: i64,
    },

    /// Payments are only recorded against completed work orders.
    #[error("work order {work_order_id} is {status}, cannot record a payment")]
    WorkOrderNotPayable {
        work_order_id: String,
        status: String,
    },

    /// Payment would push paid_amount past total_amount.
    #[error("payment exceeds remaining balance of {remaining} on work order {work_order_id}")]
    PaymentExceedsTotal {
        work_order_id: String,
        remaining: String,
    },

    /// Paid work orders cannot be cancelled.
    #[error("work order {work_order_id} is paid, cannot cancel")]
    WorkOrderPaid { work_order_id: String },

    /// Finalize-and-pay requires in_progress or completed.
    #[error("work order {work_order_id} is {status}, cannot finalize")]
    WorkOrderNotFinalizable {
        work_order_id: String,
        status: String,
    },

    /// The vehicle status record was already closed.
    #[error("vehicle status {status_id} was already exited")]
    AlreadyExited { status_id: String },
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity is required");

        let err = ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        };
        assert_eq!(err.to_string(), "unit_price must be positive");
    }

    #[test]
    fn test_guard_violation_messages() {
        let err = GuardViolation::ItemsIncomplete {
            work_order_id: "wo-1".to_string(),
            pending: 2,
        };
        assert_eq!(err.to_string(), "work order wo-1 has 2 unfinished item(s)");

        let err = GuardViolation::QuoteExpired {
            quote_id: "q-1".to_string(),
        };
        assert_eq!(err.to_string(), "quote q-1 has expired");
    }
}
