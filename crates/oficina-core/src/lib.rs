//! # oficina-core: Pure Business Logic for Oficina
//!
//! This crate is the **heart** of the repair-shop system. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Oficina Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Presentation Layer                           │   │
//! │  │    Quote forms ──► Work-order board ──► Department tracker      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ oficina-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ validation│  │   │
//! │  │   │   Quote   │  │   Money   │  │  totals   │  │   rules   │  │   │
//! │  │   │ WorkOrder │  │  Currency │  │ completion│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    oficina-db (Database Layer)                  │   │
//! │  │         SQLite queries, transactions, repositories              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Quote, WorkOrder, VehicleStatus, catalogs)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - Line-item math and owner total derivation
//! - [`error`] - Validation errors and lifecycle guard violations
//! - [`validation`] - Field-level business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every guard takes `now` as a parameter; this crate
//!    never reads the clock
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are minor units (i64) with an
//!    explicit currency tag
//! 4. **Soft Failures**: illegal transitions are values (`GuardViolation`),
//!    never panics
//!
//! ## Example Usage
//!
//! ```rust
//! use oficina_core::money::Money;
//! use oficina_core::ledger;
//!
//! // Unit price from the catalog, quantity from the form
//! let unit_price = ledger::resolve_unit_price(None, Money::brl(10_000));
//! let total = ledger::line_total(unit_price, 2);
//! assert_eq!(total.cents(), 20_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use oficina_core::Money` instead of
// `use oficina_core::money::Money`

pub use error::{GuardViolation, ValidationError};
pub use money::{Currency, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days a quote stays valid when no explicit expiry is supplied.
pub const DEFAULT_QUOTE_VALIDITY_DAYS: i64 = 30;

/// Maximum quantity of a single line item.
///
/// Catches obvious typos (1000 instead of 10) before they hit the ledger.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length for catalog entity names.
pub const MAX_NAME_LEN: usize = 100;

/// Work orders older than this many days and still unfinished count as
/// overdue in listings.
pub const OVERDUE_AFTER_DAYS: i64 = 7;
