//! # Catalog Repository
//!
//! Reference data the lifecycle consumes: service types (with the default
//! price the ledger falls back to), departments (vehicle movement targets)
//! and the minimal vehicle registry.
//!
//! The lifecycle core never mutates these except through the operations
//! here; quote/work-order repositories only read them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use oficina_core::validation::{normalize_license_plate, validate_name, validate_unit_price};
use oficina_core::{Department, Money, ServiceType, Vehicle};

// =============================================================================
// Input Types
// =============================================================================

/// Input for a new service type.
#[derive(Debug, Clone)]
pub struct NewServiceType {
    pub name: String,
    pub description: Option<String>,
    /// Catalog price used when an item is added without an explicit price.
    pub default_price: Money,
}

/// Input for a new department.
#[derive(Debug, Clone)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}

/// Input for a new vehicle. The plate is normalized before storage.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub license_plate: String,
    pub description: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Service types
    // -------------------------------------------------------------------------

    /// Creates a service type. The default price must be positive: it backs
    /// the ledger's price fallback and a zero would defeat the item checks.
    pub async fn create_service_type(&self, new: NewServiceType) -> DbResult<ServiceType> {
        validate_name(&new.name)?;
        validate_unit_price(new.default_price)?;

        let now = Utc::now();
        let service_type = ServiceType {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            default_price_cents: new.default_price.cents(),
            currency: new.default_price.currency(),
            active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %service_type.id, name = %service_type.name, "Creating service type");

        sqlx::query(
            r#"
            INSERT INTO service_types (
                id, name, description, default_price_cents, currency,
                active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&service_type.id)
        .bind(&service_type.name)
        .bind(&service_type.description)
        .bind(service_type.default_price_cents)
        .bind(service_type.currency)
        .bind(service_type.active)
        .bind(service_type.created_at)
        .bind(service_type.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(service_type)
    }

    /// Gets a service type by ID.
    pub async fn get_service_type(&self, id: &str) -> DbResult<Option<ServiceType>> {
        let service_type = sqlx::query_as::<_, ServiceType>(
            r#"
            SELECT id, name, description, default_price_cents, currency,
                   active, created_at, updated_at
            FROM service_types
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(service_type)
    }

    /// Lists active service types ordered by name.
    pub async fn list_active_service_types(&self) -> DbResult<Vec<ServiceType>> {
        let rows = sqlx::query_as::<_, ServiceType>(
            r#"
            SELECT id, name, description, default_price_cents, currency,
                   active, created_at, updated_at
            FROM service_types
            WHERE active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Activates or deactivates a service type (soft delete).
    pub async fn set_service_type_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE service_types SET active = ?2, updated_at = ?3 WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ServiceType", id));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Departments
    // -------------------------------------------------------------------------

    /// Creates a department.
    pub async fn create_department(&self, new: NewDepartment) -> DbResult<Department> {
        validate_name(&new.name)?;

        let now = Utc::now();
        let department = Department {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            description: new.description,
            active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %department.id, name = %department.name, "Creating department");

        sqlx::query(
            r#"
            INSERT INTO departments (id, name, description, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&department.id)
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.active)
        .bind(department.created_at)
        .bind(department.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(department)
    }

    /// Gets a department by ID.
    pub async fn get_department(&self, id: &str) -> DbResult<Option<Department>> {
        let department = sqlx::query_as::<_, Department>(
            r#"
            SELECT id, name, description, active, created_at, updated_at
            FROM departments
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(department)
    }

    /// Lists active departments ordered by name.
    pub async fn list_active_departments(&self) -> DbResult<Vec<Department>> {
        let rows = sqlx::query_as::<_, Department>(
            r#"
            SELECT id, name, description, active, created_at, updated_at
            FROM departments
            WHERE active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Activates or deactivates a department.
    pub async fn set_department_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE departments SET active = ?2, updated_at = ?3 WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Department", id));
        }
        Ok(())
    }

    /// Number of vehicles currently inside a department (open stays).
    pub async fn department_vehicle_count(&self, department_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM vehicle_statuses
            WHERE department_id = ?1 AND exited_at IS NULL
            "#,
        )
        .bind(department_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Vehicles
    // -------------------------------------------------------------------------

    /// Registers a vehicle. The license plate is normalized (uppercase,
    /// alphanumeric) and must be unique.
    pub async fn create_vehicle(&self, new: NewVehicle) -> DbResult<Vehicle> {
        let plate = normalize_license_plate(&new.license_plate)?;

        let now = Utc::now();
        let vehicle = Vehicle {
            id: Uuid::new_v4().to_string(),
            license_plate: plate,
            description: new.description,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %vehicle.id, plate = %vehicle.license_plate, "Registering vehicle");

        sqlx::query(
            r#"
            INSERT INTO vehicles (id, license_plate, description, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&vehicle.id)
        .bind(&vehicle.license_plate)
        .bind(&vehicle.description)
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(vehicle)
    }

    /// Gets a vehicle by ID.
    pub async fn get_vehicle(&self, id: &str) -> DbResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, license_plate, description, created_at, updated_at
            FROM vehicles
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    /// Finds a vehicle by plate, applying the same normalization as
    /// registration so "abc-1d23" finds "ABC1D23".
    pub async fn find_vehicle_by_plate(&self, plate: &str) -> DbResult<Option<Vehicle>> {
        let normalized = normalize_license_plate(plate)?;

        let vehicle = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT id, license_plate, description, created_at, updated_at
            FROM vehicles
            WHERE license_plate = ?1
            "#,
        )
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing::test_db;
    use oficina_core::Currency;

    #[tokio::test]
    async fn test_service_type_round_trip() {
        let db = test_db().await;

        let created = db
            .catalog()
            .create_service_type(NewServiceType {
                name: "Oil change".to_string(),
                description: Some("Full synthetic".to_string()),
                default_price: Money::from_cents(12_000, Currency::BRL),
            })
            .await
            .unwrap();

        let fetched = db
            .catalog()
            .get_service_type(&created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Oil change");
        assert_eq!(fetched.default_price().cents(), 12_000);
        assert!(fetched.active);
    }

    #[tokio::test]
    async fn test_service_type_rejects_zero_price() {
        let db = test_db().await;

        let result = db
            .catalog()
            .create_service_type(NewServiceType {
                name: "Freebie".to_string(),
                description: None,
                default_price: Money::brl(0),
            })
            .await;

        assert!(matches!(result, Err(DbError::Validation(_))));
    }

    #[tokio::test]
    async fn test_deactivated_service_type_leaves_active_list() {
        let db = test_db().await;
        let catalog = db.catalog();

        let st = catalog
            .create_service_type(NewServiceType {
                name: "Alignment".to_string(),
                description: None,
                default_price: Money::brl(9_000),
            })
            .await
            .unwrap();

        assert_eq!(catalog.list_active_service_types().await.unwrap().len(), 1);

        catalog.set_service_type_active(&st.id, false).await.unwrap();
        assert!(catalog.list_active_service_types().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vehicle_plate_normalization() {
        let db = test_db().await;
        let catalog = db.catalog();

        let vehicle = catalog
            .create_vehicle(NewVehicle {
                license_plate: "abc-1d23".to_string(),
                description: None,
            })
            .await
            .unwrap();
        assert_eq!(vehicle.license_plate, "ABC1D23");

        let found = catalog
            .find_vehicle_by_plate(" abc 1d23 ")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, vehicle.id);
    }

    #[tokio::test]
    async fn test_duplicate_plate_rejected() {
        let db = test_db().await;
        let catalog = db.catalog();

        catalog
            .create_vehicle(NewVehicle {
                license_plate: "BRA2E19".to_string(),
                description: None,
            })
            .await
            .unwrap();

        let dup = catalog
            .create_vehicle(NewVehicle {
                license_plate: "bra-2e19".to_string(),
                description: None,
            })
            .await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_department_activation() {
        let db = test_db().await;
        let catalog = db.catalog();

        let dept = catalog
            .create_department(NewDepartment {
                name: "Paint shop".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(catalog.department_vehicle_count(&dept.id).await.unwrap(), 0);

        catalog.set_department_active(&dept.id, false).await.unwrap();
        assert!(catalog.list_active_departments().await.unwrap().is_empty());
    }
}
