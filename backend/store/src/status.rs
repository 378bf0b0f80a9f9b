use tracing::info;

use crate::{error::MaintenanceResult, models::Status, repository::RequestStore};

/// Moves request `id` to the bucket named by `raw_status`. Anything other than
/// the four exact literals is rejected with `InvalidStatus` before the store is touched.
pub async fn update_status(
    store: &dyn RequestStore,
    id: i64,
    raw_status: &str,
    expected_version: Option<i64>,
) -> MaintenanceResult<Status> {
    let status: Status = raw_status.parse()?;

    store.update_status(id, status, expected_version).await?;
    info!(id, %status, "Maintenance request status updated");

    Ok(status)
}
