use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error("Maintenance request {0} not found")]
    NotFound(i64),

    #[error("Equipment {0} not found")]
    EquipmentNotFound(i64),

    #[error("Invalid status {0:?}, expected one of New, In Progress, Repaired, Scrap")]
    InvalidStatus(String),

    #[error("Invalid priority {0:?}, expected one of Low, Medium, High, Critical")]
    InvalidPriority(String),

    #[error("Invalid request type {0:?}, expected Preventive or Corrective")]
    InvalidRequestType(String),

    #[error("Stored request {id} has unknown status bucket {status:?}")]
    UnknownStatusBucket { id: i64, status: String },

    #[error("Request {id} is at version {actual}, update expected version {expected}")]
    Conflict { id: i64, expected: i64, actual: i64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;
