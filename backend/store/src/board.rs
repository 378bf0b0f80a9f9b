//! # Board
//!
//! Kanban view of every maintenance request, grouped by status.
//!
//! The board is recomputed on each read and never cached. It is a complete
//! partition of the request table: each row lands in exactly one of the four
//! buckets, and a row whose status is not one of the four literals fails the
//! whole projection with `UnknownStatusBucket`.
//!
//! ## Consistency
//! The scan is one SELECT. Rows inserted by the simulator while a snapshot is
//! being taken may or may not be included, and `server_time` is stamped before
//! the scan without any causal link to the rows. Polling clients use it only to
//! gauge staleness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    error::{MaintenanceError, MaintenanceResult},
    models::{Priority, RequestRow, Status},
    repository::RequestStore,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub id: i64,
    pub subject: String,
    pub priority: Option<Priority>,
}

/// All four buckets are always serialized, empty or not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    #[serde(rename = "New")]
    pub new: Vec<RequestSummary>,
    #[serde(rename = "In Progress")]
    pub in_progress: Vec<RequestSummary>,
    #[serde(rename = "Repaired")]
    pub repaired: Vec<RequestSummary>,
    #[serde(rename = "Scrap")]
    pub scrap: Vec<RequestSummary>,
}

impl Board {
    pub fn bucket(&self, status: Status) -> &[RequestSummary] {
        match status {
            Status::New => &self.new,
            Status::InProgress => &self.in_progress,
            Status::Repaired => &self.repaired,
            Status::Scrap => &self.scrap,
        }
    }

    fn bucket_mut(&mut self, status: Status) -> &mut Vec<RequestSummary> {
        match status {
            Status::New => &mut self.new,
            Status::InProgress => &mut self.in_progress,
            Status::Repaired => &mut self.repaired,
            Status::Scrap => &mut self.scrap,
        }
    }

    pub fn len(&self) -> usize {
        Status::ALL.iter().map(|&s| self.bucket(s).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub server_time: DateTime<Utc>,
    pub board: Board,
}

/// Partitions `rows` by status, keeping their order within each bucket.
pub fn project(rows: Vec<RequestRow>) -> MaintenanceResult<Board> {
    let mut board = Board::default();

    for row in rows {
        let status: Status = row.status.parse().map_err(|_| {
            error!(id = row.id, status = %row.status, "Request violates status invariant");

            MaintenanceError::UnknownStatusBucket {
                id: row.id,
                status: row.status.clone(),
            }
        })?;

        let priority = match row.priority.as_deref() {
            None => None,
            Some(raw) => match raw.parse() {
                Ok(priority) => Some(priority),
                Err(_) => {
                    warn!(id = row.id, priority = raw, "Unreadable priority, showing none");
                    None
                }
            },
        };

        board.bucket_mut(status).push(RequestSummary {
            id: row.id,
            subject: row.subject,
            priority,
        });
    }

    Ok(board)
}

pub async fn board(store: &dyn RequestStore) -> MaintenanceResult<Board> {
    project(store.list_requests().await?)
}

pub async fn snapshot(store: &dyn RequestStore) -> MaintenanceResult<Snapshot> {
    let server_time = Utc::now();
    let board = board(store).await?;

    Ok(Snapshot { server_time, board })
}
