//! Cache key scheme shared by the orchestrator and the query surface.

use uuid::Uuid;

/// Key of a job record: `job:<job_id>`.
pub fn job_key(job_id: &Uuid) -> String {
    format!("job:{}", job_id)
}

/// Key of a phase result: `view:<dataset_ref>:<view_name>`.
///
/// View names never contain `:`, so the last segment is always the view.
pub fn view_key(dataset_ref: &str, view_name: &str) -> String {
    format!("view:{}:{}", dataset_ref, view_name)
}
