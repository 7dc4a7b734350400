//! # Repository Implementations
//!
//! One repository per aggregate:
//!
//! - [`quote`] - Quotes, their line items, status transitions and the
//!   quote → work-order converter
//! - [`work_order`] - Work orders, item completion, payments
//! - [`vehicle_status`] - Vehicle location tracking across departments
//! - [`catalog`] - Service types, departments and the minimal vehicle
//!   registry
//!
//! ## Conventions
//!
//! - Single-write status transitions are compare-and-set UPDATEs: the guard
//!   lives in the WHERE clause and `rows_affected() == 0` means the state
//!   moved under us; the repository then re-reads to produce the precise
//!   guard violation
//! - Multi-write operations (conversion, location entry) run inside one
//!   transaction; nothing partial ever commits
//! - Every item mutation recomputes and persists the owner's total before
//!   the transaction commits

pub mod catalog;
pub mod quote;
pub mod vehicle_status;
pub mod work_order;

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for repository tests. In-memory database per test.

    use oficina_core::{Currency, Money};

    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::{NewDepartment, NewServiceType, NewVehicle};

    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    pub async fn seed_vehicle(db: &Database, plate: &str) -> String {
        db.catalog()
            .create_vehicle(NewVehicle {
                license_plate: plate.to_string(),
                description: Some("Test vehicle".to_string()),
            })
            .await
            .expect("seed vehicle")
            .id
    }

    pub async fn seed_service_type(db: &Database, name: &str, price_cents: i64) -> String {
        db.catalog()
            .create_service_type(NewServiceType {
                name: name.to_string(),
                description: None,
                default_price: Money::from_cents(price_cents, Currency::BRL),
            })
            .await
            .expect("seed service type")
            .id
    }

    pub async fn seed_department(db: &Database, name: &str) -> String {
        db.catalog()
            .create_department(NewDepartment {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed department")
            .id
    }
}
