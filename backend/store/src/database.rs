//! # SQLite
//!
//! Relational store behind the maintenance board.
//!
//! Core purpose is to hold maintenance requests durably and give every write
//! its own atomic statement or transaction, which is the only coordination the
//! API handlers and the ingestion simulator share.
//!
//! ## Tables
//!
//! - `equipment`: referenced by requests, owns a display name and a health score.
//! - `maintenance_requests`: the board's source. Status is plain text with no
//!   CHECK constraint; writers validate it and the board projector verifies it.
//!
//! ## Implementation
//!
//! - Equipment references are resolved inside the INSERT itself, an unknown id
//!   becomes NULL rather than a foreign-key failure
//! - `version` starts at 0 and is bumped on every status update
//! - In-memory databases live on a single pooled connection that is never
//!   recycled, otherwise each new connection would see an empty database

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::{
    error::{MaintenanceError, MaintenanceResult},
    models::{
        Equipment, EquipmentHealth, MaintenanceRequest, NewEquipment, NewRequest, RequestRow, Status,
    },
    repository::RequestStore,
};

pub const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS equipment (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        location TEXT,
        is_functional INTEGER NOT NULL DEFAULT 1,
        health_score REAL NOT NULL DEFAULT 100.0
    );

    CREATE TABLE IF NOT EXISTS maintenance_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        subject TEXT NOT NULL,
        description TEXT,
        request_type TEXT NOT NULL DEFAULT 'Corrective',
        status TEXT NOT NULL DEFAULT 'New',
        priority TEXT,
        equipment_id INTEGER REFERENCES equipment(id),
        scheduled_date TEXT,
        duration_hours REAL,
        version INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct StoredRequest {
    id: i64,
    subject: String,
    description: Option<String>,
    request_type: String,
    status: String,
    priority: Option<String>,
    equipment_id: Option<i64>,
    scheduled_date: Option<NaiveDate>,
    duration_hours: Option<f64>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoredRequest> for MaintenanceRequest {
    type Error = MaintenanceError;

    fn try_from(row: StoredRequest) -> Result<Self, Self::Error> {
        let status = Status::from_str(&row.status).map_err(|_| {
            MaintenanceError::UnknownStatusBucket {
                id: row.id,
                status: row.status.clone(),
            }
        })?;

        Ok(Self {
            id: row.id,
            subject: row.subject,
            description: row.description,
            request_type: row.request_type.parse()?,
            status,
            priority: row.priority.as_deref().map(str::parse).transpose()?,
            equipment_id: row.equipment_id,
            scheduled_date: row.scheduled_date,
            duration_hours: row.duration_hours,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct EquipmentHealthRow {
    name: String,
    health_score: f64,
    is_functional: bool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> MaintenanceResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    pub async fn connect_default(database_url: &str) -> MaintenanceResult<Self> {
        Self::connect(database_url, MAX_CONNECTIONS).await
    }

    pub async fn in_memory() -> MaintenanceResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> MaintenanceResult<Self> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        info!("Maintenance schema ready");

        Ok(Self { pool })
    }

    pub async fn insert_equipment(&self, equipment: &NewEquipment) -> MaintenanceResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO equipment (name, location, is_functional, health_score) \
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&equipment.name)
        .bind(&equipment.location)
        .bind(equipment.is_functional)
        .bind(equipment.health_score)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn equipment_health(&self) -> MaintenanceResult<Vec<EquipmentHealth>> {
        let rows = sqlx::query_as::<_, EquipmentHealthRow>(
            "SELECT name, health_score, is_functional FROM equipment ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| EquipmentHealth {
                name: row.name,
                score: row.health_score,
                status: if row.is_functional {
                    "Functional".to_string()
                } else {
                    "Out of Service".to_string()
                },
            })
            .collect())
    }

    pub async fn list_equipment(&self) -> MaintenanceResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            "SELECT id, name, location, is_functional, health_score FROM equipment ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_equipment(&self, id: i64) -> MaintenanceResult<Option<Equipment>> {
        let row = sqlx::query_as::<_, Equipment>(
            "SELECT id, name, location, is_functional, health_score FROM equipment WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl RequestStore for SqliteStore {
    async fn insert_request(&self, request: &NewRequest) -> MaintenanceResult<i64> {
        let now = Utc::now();

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO maintenance_requests \
             (subject, description, request_type, status, priority, equipment_id, \
              scheduled_date, duration_hours, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, (SELECT id FROM equipment WHERE id = ?), ?, ?, ?, ?) \
             RETURNING id",
        )
        .bind(&request.subject)
        .bind(&request.description)
        .bind(request.request_type.as_str())
        .bind(request.status.as_str())
        .bind(request.priority.map(|p| p.as_str()))
        .bind(request.equipment_id)
        .bind(request.scheduled_date)
        .bind(request.duration_hours)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn list_requests(&self) -> MaintenanceResult<Vec<RequestRow>> {
        let rows = sqlx::query_as::<_, RequestRow>(
            "SELECT id, subject, status, priority FROM maintenance_requests",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn update_status(
        &self,
        id: i64,
        status: Status,
        expected_version: Option<i64>,
    ) -> MaintenanceResult<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE maintenance_requests \
             SET status = ?, version = version + 1, updated_at = ? \
             WHERE id = ? AND (? IS NULL OR version = ?)",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected_version)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let actual = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM maintenance_requests WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

            tx.rollback().await?;

            return Err(match (actual, expected_version) {
                (Some(actual), Some(expected)) => MaintenanceError::Conflict {
                    id,
                    expected,
                    actual,
                },
                _ => MaintenanceError::NotFound(id),
            });
        }

        tx.commit().await?;

        Ok(())
    }

    async fn get_request(&self, id: i64) -> MaintenanceResult<Option<MaintenanceRequest>> {
        let row = sqlx::query_as::<_, StoredRequest>(
            "SELECT id, subject, description, request_type, status, priority, equipment_id, \
             scheduled_date, duration_hours, version, created_at, updated_at \
             FROM maintenance_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MaintenanceRequest::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        board::{board, snapshot},
        models::Priority,
        status::update_status,
    };

    /// Writes a status literal without validation, to corrupt a row on purpose.
    async fn force_status(store: &SqliteStore, id: i64, raw_status: &str) {
        sqlx::query("UPDATE maintenance_requests SET status = ? WHERE id = ?")
            .bind(raw_status)
            .bind(id)
            .execute(&store.pool)
            .await
            .unwrap();
    }

    async fn seeded() -> (SqliteStore, Vec<i64>) {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut ids = Vec::new();

        for subject in ["Pump leak", "Belt worn", "Motor hum"] {
            let mut request = NewRequest::new(subject);
            request.priority = Some(Priority::Medium);
            ids.push(store.insert_request(&request).await.unwrap());
        }

        (store, ids)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteStore::in_memory().await.unwrap();
        let equipment_id = store
            .insert_equipment(&NewEquipment {
                name: "Lathe 3".to_string(),
                location: Some("Bay 2".to_string()),
                health_score: 72.5,
                is_functional: true,
            })
            .await
            .unwrap();

        let mut request = NewRequest::new("Spindle noise");
        request.equipment_id = Some(equipment_id);
        request.duration_hours = Some(1.5);
        let id = store.insert_request(&request).await.unwrap();

        let stored = store.get_request(id).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Spindle noise");
        assert_eq!(stored.status, Status::New);
        assert_eq!(stored.equipment_id, Some(equipment_id));
        assert_eq!(stored.duration_hours, Some(1.5));
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn test_unknown_equipment_reference_is_nulled() {
        let store = SqliteStore::in_memory().await.unwrap();

        let mut request = NewRequest::new("Ghost machine");
        request.equipment_id = Some(4242);
        let id = store.insert_request(&request).await.unwrap();

        assert_eq!(store.get_request(id).await.unwrap().unwrap().equipment_id, None);
    }

    #[tokio::test]
    async fn test_status_transition_moves_bucket() {
        let (store, ids) = seeded().await;

        update_status(&store, ids[1], "In Progress", None).await.unwrap();
        let board = board(&store).await.unwrap();

        let in_progress: Vec<i64> = board.in_progress.iter().map(|s| s.id).collect();
        assert_eq!(in_progress, vec![ids[1]]);
        assert!(board.new.iter().all(|s| s.id != ids[1]));
        assert_eq!(board.new.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_id_is_not_found_and_store_unchanged() {
        let (store, _) = seeded().await;
        let before = board(&store).await.unwrap();

        let result = update_status(&store, 999_999, "Scrap", None).await;

        assert!(matches!(result, Err(MaintenanceError::NotFound(999_999))));
        assert_eq!(board(&store).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_invalid_status_rejected_before_store() {
        let (store, ids) = seeded().await;

        let result = update_status(&store, ids[0], "Done", None).await;

        assert!(matches!(result, Err(MaintenanceError::InvalidStatus(_))));
        assert_eq!(
            store.get_request(ids[0]).await.unwrap().unwrap().status,
            Status::New
        );
    }

    #[tokio::test]
    async fn test_versioned_update_detects_stale_writer() {
        let (store, ids) = seeded().await;

        update_status(&store, ids[0], "In Progress", Some(0)).await.unwrap();
        let stale = update_status(&store, ids[0], "Scrap", Some(0)).await;

        assert!(matches!(
            stale,
            Err(MaintenanceError::Conflict { expected: 0, actual: 1, .. })
        ));

        // Unversioned writes keep last-write-wins.
        update_status(&store, ids[0], "Repaired", None).await.unwrap();
        let stored = store.get_request(ids[0]).await.unwrap().unwrap();
        assert_eq!(stored.status, Status::Repaired);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_versioned_update_of_missing_id() {
        let store = SqliteStore::in_memory().await.unwrap();

        let result = update_status(&store, 7, "Scrap", Some(3)).await;

        assert!(matches!(result, Err(MaintenanceError::NotFound(7))));
    }

    #[tokio::test]
    async fn test_snapshots_without_writes_share_board() {
        let (store, _) = seeded().await;

        let first = snapshot(&store).await.unwrap();
        let second = snapshot(&store).await.unwrap();

        assert_eq!(first.board, second.board);
        assert!(second.server_time >= first.server_time);
    }

    #[tokio::test]
    async fn test_corrupted_status_surfaces_on_board() {
        let (store, ids) = seeded().await;
        force_status(&store, ids[2], "Archived").await;

        assert!(matches!(
            board(&store).await,
            Err(MaintenanceError::UnknownStatusBucket { id, .. }) if id == ids[2]
        ));
    }

    #[tokio::test]
    async fn test_equipment_health() {
        let store = SqliteStore::in_memory().await.unwrap();
        for (name, score, is_functional) in [("Boiler", 88.0, true), ("Press", 12.0, false)] {
            store
                .insert_equipment(&NewEquipment {
                    name: name.to_string(),
                    location: None,
                    health_score: score,
                    is_functional,
                })
                .await
                .unwrap();
        }

        let health = store.equipment_health().await.unwrap();

        assert_eq!(health.len(), 2);
        assert_eq!(health[0].status, "Functional");
        assert_eq!(health[1].status, "Out of Service");
        assert_eq!(health[1].score, 12.0);
    }

    #[tokio::test]
    async fn test_equipment_reads() {
        let store = SqliteStore::in_memory().await.unwrap();
        let id = store
            .insert_equipment(&NewEquipment {
                name: "Conveyor".to_string(),
                location: Some("Line 2".to_string()),
                health_score: 64.0,
                is_functional: true,
            })
            .await
            .unwrap();

        let all = store.list_equipment().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);

        let one = store.get_equipment(id).await.unwrap().unwrap();
        assert_eq!(one.name, "Conveyor");
        assert_eq!(one.location.as_deref(), Some("Line 2"));
        assert!(one.is_functional);

        assert!(store.get_equipment(id + 1).await.unwrap().is_none());
    }
}
