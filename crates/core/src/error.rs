use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The job is leased, but not by the caller, or the caller's lease
    /// has expired. `holder` is the factory name of the current lease,
    /// `None` when the lease has simply run out.
    #[error("Job {job_id} is not leased by this factory{}", holder_suffix(.holder))]
    LeaseConflict {
        job_id: DbId,
        holder: Option<String>,
    },

    /// The job was never leased by anyone.
    #[error("Job {job_id} was not locked.")]
    NotLocked { job_id: DbId },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(name) => format!(" (locked by factory {name})"),
        None => " (lease expired)".to_string(),
    }
}
