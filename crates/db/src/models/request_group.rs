//! Request group models and submission DTOs.

use serde::{Deserialize, Serialize};
use shotserver_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `request_groups` table. Never mutated after insert.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RequestGroup {
    pub id: DbId,
    pub website_url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub bits_per_pixel: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
    pub media: Option<String>,
    pub submitted_by: Option<DbId>,
    pub submitter_ip: Option<String>,
    pub submitted_at: Timestamp,
    pub expires_at: Timestamp,
}

/// DTO for inserting a request group. `None` options mean "don't care".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequestGroup {
    pub website_url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub bits_per_pixel: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
    pub media: Option<String>,
    pub submitted_by: Option<DbId>,
    pub submitter_ip: Option<String>,
    pub expires_at: Timestamp,
}

/// A request group with its open/closed job counts, for the queue view.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RequestGroupSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub group: RequestGroup,
    pub job_count: i64,
    pub completed_count: i64,
}
