//! # oficina-db: Database Layer for Oficina
//!
//! This crate provides database access for the repair-shop system.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Oficina Data Flow                                │
//! │                                                                         │
//! │  Caller (UI command, API handler)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     oficina-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  quote.rs     │    │  (embedded)  │  │   │
//! │  │   │               │    │  work_order.rs│    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  vehicle_     │    │ 001_initial  │  │   │
//! │  │   │ WAL + FKs     │    │    status.rs  │    │ 002_guards   │  │   │
//! │  │   │               │    │  catalog.rs   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types (including wrapped domain failures)
//! - [`repository`] - Repository implementations per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use oficina_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/oficina.db")).await?;
//!
//! let quote = db.quotes().create(new_quote).await?;
//! db.quotes().approve(&quote.id).await?;
//! let wo = db.quotes().convert_to_work_order(&quote.id, "user-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogRepository, NewDepartment, NewServiceType, NewVehicle};
pub use repository::quote::{Approval, NewQuote, NewQuoteItem, QuoteRepository};
pub use repository::vehicle_status::{NewEntry, VehicleStatusRepository};
pub use repository::work_order::{NewWorkOrder, NewWorkOrderItem, WorkOrderRepository};
