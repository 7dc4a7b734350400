//! # Validation Module
//!
//! Field-level validation for the repair-shop core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation (forms)                                         │
//! │  ├── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (business rules, pure)                           │
//! │  ├── quantity > 0, unit price > 0, expiry in the future               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL, CHECK, UNIQUE and FK constraints                        │
//! │  └── partial unique indexes guarding lifecycle invariants              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::{ValidationError, ValidationResult};
use crate::money::Money;
use crate::{MAX_ITEM_QUANTITY, MAX_NAME_LEN};

// =============================================================================
// Line Item Rules
// =============================================================================

/// Validates a line-item quantity.
///
/// ## Example
/// ```rust
/// use oficina_core::validation::validate_quantity;
///
/// assert!(validate_quantity(3).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(-2).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates the effective unit price of a line item.
///
/// Runs AFTER the catalog-price fallback, so a zero here means neither the
/// caller nor the service type supplied a usable price.
pub fn validate_unit_price(unit_price: Money) -> ValidationResult<()> {
    if !unit_price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        });
    }
    Ok(())
}

/// Validates an incoming payment amount.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "payment_amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Quote Rules
// =============================================================================

/// A quote's expiry must be strictly in the future at creation time.
pub fn validate_expires_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> ValidationResult<()> {
    if expires_at <= now {
        return Err(ValidationError::MustBeFuture {
            field: "expires_at".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Catalog Rules
// =============================================================================

/// Validates a catalog entity name (service type, department).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Normalizes a license plate: uppercase, alphanumeric characters only.
///
/// ## Example
/// ```rust
/// use oficina_core::validation::normalize_license_plate;
///
/// assert_eq!(normalize_license_plate("abc-1d23").unwrap(), "ABC1D23");
/// assert!(normalize_license_plate("--- ---").is_err());
/// ```
pub fn normalize_license_plate(plate: &str) -> ValidationResult<String> {
    let normalized: String = plate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "license_plate".to_string(),
        });
    }
    if normalized.len() > 10 {
        return Err(ValidationError::TooLong {
            field: "license_plate".to_string(),
            max: 10,
        });
    }
    Ok(normalized)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-5).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Money::brl(1)).is_ok());
        assert!(validate_unit_price(Money::brl(0)).is_err());
        assert!(validate_unit_price(Money::brl(-100)).is_err());
    }

    #[test]
    fn test_validate_expires_at() {
        let now = Utc.timestamp_opt(1_000, 0).unwrap();
        assert!(validate_expires_at(Utc.timestamp_opt(1_001, 0).unwrap(), now).is_ok());
        assert!(validate_expires_at(now, now).is_err());
        assert!(validate_expires_at(Utc.timestamp_opt(999, 0).unwrap(), now).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Funilaria").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_normalize_license_plate() {
        assert_eq!(normalize_license_plate("abc-1d23").unwrap(), "ABC1D23");
        assert_eq!(normalize_license_plate(" bra 2e19 ").unwrap(), "BRA2E19");
        assert!(normalize_license_plate("").is_err());
        assert!(normalize_license_plate("!!!").is_err());
    }
}
