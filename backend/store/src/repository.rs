use async_trait::async_trait;

use crate::{
    error::MaintenanceResult,
    models::{MaintenanceRequest, NewRequest, RequestRow, Status},
};

/// Durable table of maintenance requests.
///
/// Every method is a single atomic store operation, so implementations can be
/// shared between API handlers and the simulator without in-process locking.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Inserts a request and returns its store-assigned id.
    async fn insert_request(&self, request: &NewRequest) -> MaintenanceResult<i64>;

    /// Full scan in store iteration order.
    async fn list_requests(&self) -> MaintenanceResult<Vec<RequestRow>>;

    /// Sets the status of one request. With `expected_version` the update only
    /// applies if the stored version still matches; without it the last write wins.
    async fn update_status(
        &self,
        id: i64,
        status: Status,
        expected_version: Option<i64>,
    ) -> MaintenanceResult<()>;

    async fn get_request(&self, id: i64) -> MaintenanceResult<Option<MaintenanceRequest>>;
}
