//! One-time challenge nonces.

use shotserver_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `nonces` table.
///
/// `job_id` is `None` for bootstrap challenges and set for nonces that
/// authorize a result upload for one leased job.
#[derive(Debug, Clone, FromRow)]
pub struct Nonce {
    pub id: DbId,
    pub factory_id: DbId,
    pub job_id: Option<DbId>,
    pub nonce: String,
    pub ip_address: Option<String>,
    pub created_at: Timestamp,
    pub consumed_at: Option<Timestamp>,
}
