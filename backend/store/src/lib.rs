//! # Store
//!
//! Maintenance requests, their Kanban board, and the single write paths that
//! touch them.
//!
//! ## Components
//! - [`RequestStore`]: durable request table, implemented by [`SqliteStore`]
//! - [`board::project`]: pure partition of all requests into the four status buckets
//! - [`board::snapshot`]: board plus the server time it was taken at
//! - [`status::update_status`]: validated, atomic status transition
//!
//! ## Concurrency
//! No locks live in this crate. API handlers and the ingestion simulator share
//! the store only, and every mutation is one atomic statement or transaction.
//! Concurrent unversioned status updates to the same request resolve as last
//! write wins; callers that care pass the version they last saw.

pub mod board;
pub mod database;
pub mod error;
pub mod models;
pub mod repository;
pub mod status;

pub use board::{Board, RequestSummary, Snapshot};
pub use database::SqliteStore;
pub use error::{MaintenanceError, MaintenanceResult};
pub use models::{
    Equipment, EquipmentHealth, MaintenanceRequest, NewEquipment, NewRequest, Priority,
    RequestRow, RequestType, Status,
};
pub use repository::RequestStore;
