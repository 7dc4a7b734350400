//! # Vehicle Status Repository
//!
//! Location tracking: which department is each vehicle in right now, and
//! where has it been.
//!
//! ## The Single-Current Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            At most ONE open status row per vehicle                      │
//! │                                                                         │
//! │  record_entry(vehicle, dept B):                                        │
//! │                                                                         │
//! │    ┌── one transaction ───────────────────────────────────────────┐    │
//! │    │ 1. close the open row, if any                                │    │
//! │    │      exited_at = now, stage = exited,                        │    │
//! │    │      note appended: "transfer to B"                          │    │
//! │    │ 2. insert the new open row for dept B                        │    │
//! │    └──────────────────────────────────────────────────────────────┘    │
//! │                                                                         │
//! │  A crash between 1 and 2 rolls the close back: never zero, never      │
//! │  two open rows. A partial UNIQUE index on (vehicle_id) WHERE           │
//! │  exited_at IS NULL enforces the same invariant structurally, so a     │
//! │  racing writer fails loudly instead of corrupting the trail.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use oficina_core::{GuardViolation, LocationStage, Stay, VehicleStatus};

// =============================================================================
// Input & Row Types
// =============================================================================

/// Input for a department entry.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub vehicle_id: String,
    pub department_id: String,
    pub work_order_id: String,
    /// Staff member recording the movement.
    pub author_id: String,
    pub notes: Option<String>,
}

/// Storage shape of a vehicle status: `exited_at` is a nullable column.
/// The public [`VehicleStatus`] carries the tagged [`Stay`] state instead;
/// this row type exists only to bridge the two.
#[derive(Debug, sqlx::FromRow)]
struct VehicleStatusRow {
    id: String,
    vehicle_id: String,
    department_id: String,
    work_order_id: String,
    author_id: String,
    stage: LocationStage,
    entered_at: chrono::DateTime<Utc>,
    exited_at: Option<chrono::DateTime<Utc>>,
    notes: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl VehicleStatusRow {
    fn into_status(self) -> VehicleStatus {
        VehicleStatus {
            id: self.id,
            vehicle_id: self.vehicle_id,
            department_id: self.department_id,
            work_order_id: self.work_order_id,
            author_id: self.author_id,
            stage: self.stage,
            entered_at: self.entered_at,
            stay: Stay::from_exited_at(self.exited_at),
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const STATUS_COLUMNS: &str = "id, vehicle_id, department_id, work_order_id, author_id, stage, \
     entered_at, exited_at, notes, created_at, updated_at";

async fn fetch_status<'e, E>(ex: E, id: &str) -> DbResult<Option<VehicleStatus>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, VehicleStatusRow>(&format!(
        "SELECT {STATUS_COLUMNS} FROM vehicle_statuses WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;
    Ok(row.map(VehicleStatusRow::into_status))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for vehicle location tracking.
#[derive(Debug, Clone)]
pub struct VehicleStatusRepository {
    pool: SqlitePool,
}

impl VehicleStatusRepository {
    /// Creates a new VehicleStatusRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VehicleStatusRepository { pool }
    }

    /// Records a vehicle entering a department.
    ///
    /// Closes the vehicle's current stay (if any) and opens the new one in
    /// ONE transaction. The closed record gets an auto-generated note naming
    /// the destination department.
    pub async fn record_entry(&self, new: NewEntry) -> DbResult<VehicleStatus> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Destination must exist; its name goes into the hand-off note.
        let department_name: Option<String> =
            sqlx::query_scalar("SELECT name FROM departments WHERE id = ?1")
                .bind(&new.department_id)
                .fetch_optional(&mut *tx)
                .await?;
        let department_name = department_name
            .ok_or_else(|| DbError::not_found("Department", &new.department_id))?;

        // Defect tripwire: the schema makes two open rows impossible, so
        // observing them means something bypassed this repository.
        let open_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM vehicle_statuses WHERE vehicle_id = ?1 AND exited_at IS NULL",
        )
        .bind(&new.vehicle_id)
        .fetch_one(&mut *tx)
        .await?;
        if open_rows > 1 {
            return Err(DbError::consistency(format!(
                "vehicle {} has {open_rows} open status rows",
                new.vehicle_id
            )));
        }

        // Step 1: close the current stay, appending the hand-off note.
        let auto_note = format!("Automatically exited for transfer to {department_name}");
        let closed = sqlx::query(
            "UPDATE vehicle_statuses SET \
                 exited_at = ?2, \
                 stage = 'exited', \
                 notes = CASE WHEN notes IS NULL THEN ?3 \
                              ELSE notes || char(10) || ?3 END, \
                 updated_at = ?2 \
             WHERE vehicle_id = ?1 AND exited_at IS NULL",
        )
        .bind(&new.vehicle_id)
        .bind(now)
        .bind(&auto_note)
        .execute(&mut *tx)
        .await?;

        // Step 2: open the new stay.
        let status = VehicleStatus {
            id: Uuid::new_v4().to_string(),
            vehicle_id: new.vehicle_id,
            department_id: new.department_id,
            work_order_id: new.work_order_id,
            author_id: new.author_id,
            stage: LocationStage::Entered,
            entered_at: now,
            stay: Stay::Current,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO vehicle_statuses (
                id, vehicle_id, department_id, work_order_id, author_id,
                stage, entered_at, exited_at, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?9)
            "#,
        )
        .bind(&status.id)
        .bind(&status.vehicle_id)
        .bind(&status.department_id)
        .bind(&status.work_order_id)
        .bind(&status.author_id)
        .bind(status.stage)
        .bind(status.entered_at)
        .bind(&status.notes)
        .bind(status.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(vehicle_id = %status.vehicle_id, department = %department_name,
              closed_prior = closed.rows_affected() > 0, "Vehicle entered department");
        Ok(status)
    }

    /// Closes a stay explicitly (vehicle leaves the shop floor without
    /// entering another department). Soft failure when already closed.
    pub async fn exit(
        &self,
        status_id: &str,
        exiting_user: &str,
        notes: Option<&str>,
    ) -> DbResult<VehicleStatus> {
        let now = Utc::now();

        debug!(status_id = %status_id, user = %exiting_user, "Exiting vehicle status");

        let result = sqlx::query(
            "UPDATE vehicle_statuses SET \
                 exited_at = ?2, \
                 stage = 'exited', \
                 notes = CASE \
                     WHEN ?3 IS NULL THEN notes \
                     WHEN notes IS NULL THEN ?3 \
                     ELSE notes || char(10) || ?3 END, \
                 updated_at = ?2 \
             WHERE id = ?1 AND exited_at IS NULL",
        )
        .bind(status_id)
        .bind(now)
        .bind(notes)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match fetch_status(&self.pool, status_id).await? {
                Some(_) => Err(GuardViolation::AlreadyExited {
                    status_id: status_id.to_string(),
                }
                .into()),
                None => Err(DbError::not_found("VehicleStatus", status_id)),
            };
        }

        fetch_status(&self.pool, status_id)
            .await?
            .ok_or_else(|| DbError::not_found("VehicleStatus", status_id))
    }

    /// Updates the workflow stage of an OPEN stay (waiting, in_progress,
    /// completed). The exited stage is owned by `exit`/`record_entry`.
    pub async fn set_stage(&self, status_id: &str, stage: LocationStage) -> DbResult<()> {
        if stage == LocationStage::Exited {
            return Err(GuardViolation::AlreadyExited {
                status_id: status_id.to_string(),
            }
            .into());
        }

        let result = sqlx::query(
            "UPDATE vehicle_statuses SET stage = ?2, updated_at = ?3 \
             WHERE id = ?1 AND exited_at IS NULL",
        )
        .bind(status_id)
        .bind(stage)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match fetch_status(&self.pool, status_id).await? {
                Some(_) => Err(GuardViolation::AlreadyExited {
                    status_id: status_id.to_string(),
                }
                .into()),
                None => Err(DbError::not_found("VehicleStatus", status_id)),
            };
        }
        Ok(())
    }

    /// Gets a status record by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<VehicleStatus>> {
        fetch_status(&self.pool, id).await
    }

    /// The vehicle's current (open) stay, if it is inside a department.
    ///
    /// Finding more than one open row is a `ConsistencyFailure`: the
    /// transactions and the partial unique index exist to make it
    /// impossible.
    pub async fn current_for_vehicle(&self, vehicle_id: &str) -> DbResult<Option<VehicleStatus>> {
        let rows = sqlx::query_as::<_, VehicleStatusRow>(&format!(
            "SELECT {STATUS_COLUMNS} FROM vehicle_statuses \
             WHERE vehicle_id = ?1 AND exited_at IS NULL"
        ))
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() > 1 {
            return Err(DbError::consistency(format!(
                "vehicle {vehicle_id} has {} open status rows",
                rows.len()
            )));
        }
        Ok(rows.into_iter().next().map(VehicleStatusRow::into_status))
    }

    /// Movement history for a vehicle, most recent entry first.
    pub async fn history_for_vehicle(&self, vehicle_id: &str) -> DbResult<Vec<VehicleStatus>> {
        let rows = sqlx::query_as::<_, VehicleStatusRow>(&format!(
            "SELECT {STATUS_COLUMNS} FROM vehicle_statuses \
             WHERE vehicle_id = ?1 ORDER BY entered_at DESC"
        ))
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VehicleStatusRow::into_status).collect())
    }

    /// Movement history attached to a work order, most recent entry first.
    pub async fn history_for_work_order(&self, work_order_id: &str) -> DbResult<Vec<VehicleStatus>> {
        let rows = sqlx::query_as::<_, VehicleStatusRow>(&format!(
            "SELECT {STATUS_COLUMNS} FROM vehicle_statuses \
             WHERE work_order_id = ?1 ORDER BY entered_at DESC"
        ))
        .bind(work_order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VehicleStatusRow::into_status).collect())
    }

    /// All stays recorded for a department, most recent entry first. Feeds
    /// the dwell-time statistics.
    pub async fn history_for_department(&self, department_id: &str) -> DbResult<Vec<VehicleStatus>> {
        let rows = sqlx::query_as::<_, VehicleStatusRow>(&format!(
            "SELECT {STATUS_COLUMNS} FROM vehicle_statuses \
             WHERE department_id = ?1 ORDER BY entered_at DESC"
        ))
        .bind(department_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(VehicleStatusRow::into_status).collect())
    }

    /// Average time vehicles spend in a department, over closed stays only.
    /// `None` until at least one vehicle has moved on.
    pub async fn average_stay_for_department(
        &self,
        department_id: &str,
    ) -> DbResult<Option<chrono::Duration>> {
        let history = self.history_for_department(department_id).await?;
        Ok(oficina_core::ledger::average_stay(&history))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::testing::{seed_department, seed_vehicle, test_db};
    use crate::repository::work_order::NewWorkOrder;

    async fn tracker_fixture(db: &Database) -> (String, String, String, String) {
        let vehicle_id = seed_vehicle(db, "TRK1A11").await;
        let dept_a = seed_department(db, "Body shop").await;
        let dept_b = seed_department(db, "Paint booth").await;
        let wo = db
            .work_orders()
            .create(NewWorkOrder {
                vehicle_id: vehicle_id.clone(),
                author_id: "staff-1".to_string(),
                priority: None,
                notes: None,
            })
            .await
            .unwrap();
        (vehicle_id, dept_a, dept_b, wo.id)
    }

    fn entry(vehicle: &str, dept: &str, wo: &str) -> NewEntry {
        NewEntry {
            vehicle_id: vehicle.to_string(),
            department_id: dept.to_string(),
            work_order_id: wo.to_string(),
            author_id: "staff-1".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_first_entry_opens_current_stay() {
        let db = test_db().await;
        let tracker = db.vehicle_statuses();
        let (vehicle, dept_a, _, wo) = tracker_fixture(&db).await;

        let status = tracker.record_entry(entry(&vehicle, &dept_a, &wo)).await.unwrap();
        assert!(status.is_current());
        assert_eq!(status.stage, LocationStage::Entered);

        let current = tracker.current_for_vehicle(&vehicle).await.unwrap().unwrap();
        assert_eq!(current.id, status.id);
        assert_eq!(current.department_id, dept_a);
    }

    #[tokio::test]
    async fn test_reentry_closes_prior_stay_atomically() {
        let db = test_db().await;
        let tracker = db.vehicle_statuses();
        let (vehicle, dept_a, dept_b, wo) = tracker_fixture(&db).await;

        let first = tracker.record_entry(entry(&vehicle, &dept_a, &wo)).await.unwrap();
        let second = tracker.record_entry(entry(&vehicle, &dept_b, &wo)).await.unwrap();

        // Department A's record is closed with the hand-off note appended.
        let closed = tracker.get_by_id(&first.id).await.unwrap().unwrap();
        assert!(!closed.is_current());
        assert_eq!(closed.stage, LocationStage::Exited);
        assert!(closed
            .notes
            .as_deref()
            .unwrap()
            .contains("transfer to Paint booth"));

        // Department B's record is the single open one.
        let current = tracker.current_for_vehicle(&vehicle).await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(current.department_id, dept_b);

        let open_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM vehicle_statuses WHERE vehicle_id = ?1 AND exited_at IS NULL",
        )
        .bind(&vehicle)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(open_count, 1);
    }

    #[tokio::test]
    async fn test_exit_is_soft_and_single_shot() {
        let db = test_db().await;
        let tracker = db.vehicle_statuses();
        let (vehicle, dept_a, _, wo) = tracker_fixture(&db).await;

        let status = tracker.record_entry(entry(&vehicle, &dept_a, &wo)).await.unwrap();

        let exited = tracker
            .exit(&status.id, "staff-2", Some("Customer pickup"))
            .await
            .unwrap();
        assert!(!exited.is_current());
        assert_eq!(exited.notes.as_deref(), Some("Customer pickup"));
        assert!(tracker.current_for_vehicle(&vehicle).await.unwrap().is_none());

        // Exiting twice is reported, not raised; the record is untouched.
        let again = tracker.exit(&status.id, "staff-2", None).await;
        assert!(matches!(
            again,
            Err(DbError::Guard(GuardViolation::AlreadyExited { .. }))
        ));
        let fresh = tracker.get_by_id(&status.id).await.unwrap().unwrap();
        assert_eq!(fresh.stay.exited_at(), exited.stay.exited_at());
    }

    #[tokio::test]
    async fn test_stage_updates_only_open_stays() {
        let db = test_db().await;
        let tracker = db.vehicle_statuses();
        let (vehicle, dept_a, _, wo) = tracker_fixture(&db).await;

        let status = tracker.record_entry(entry(&vehicle, &dept_a, &wo)).await.unwrap();

        tracker
            .set_stage(&status.id, LocationStage::InProgress)
            .await
            .unwrap();
        let fresh = tracker.get_by_id(&status.id).await.unwrap().unwrap();
        assert_eq!(fresh.stage, LocationStage::InProgress);

        tracker.exit(&status.id, "staff-1", None).await.unwrap();
        assert!(tracker
            .set_stage(&status.id, LocationStage::Waiting)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_history_tracks_every_stay_in_order() {
        let db = test_db().await;
        let tracker = db.vehicle_statuses();
        let (vehicle, dept_a, dept_b, wo) = tracker_fixture(&db).await;

        tracker.record_entry(entry(&vehicle, &dept_a, &wo)).await.unwrap();
        tracker.record_entry(entry(&vehicle, &dept_b, &wo)).await.unwrap();
        tracker.record_entry(entry(&vehicle, &dept_a, &wo)).await.unwrap();

        let history = tracker.history_for_vehicle(&vehicle).await.unwrap();
        assert_eq!(history.len(), 3);
        // Newest first; exactly one open.
        assert!(history[0].is_current());
        assert_eq!(history.iter().filter(|s| s.is_current()).count(), 1);

        let by_order = tracker.history_for_work_order(&wo).await.unwrap();
        assert_eq!(by_order.len(), 3);

        // Department A accumulated two stays (one closed, one open).
        let dept_history = tracker.history_for_department(&dept_a).await.unwrap();
        assert_eq!(dept_history.len(), 2);

        // Dwell time averages over the closed stay only.
        let avg = tracker.average_stay_for_department(&dept_a).await.unwrap();
        assert!(avg.is_some());
        assert!(tracker
            .average_stay_for_department(&dept_b)
            .await
            .unwrap()
            .is_some());
    }
}
