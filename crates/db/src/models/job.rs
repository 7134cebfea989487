//! Job models: one screenshot job per requested browser.

use serde::{Deserialize, Serialize};
use shotserver_core::matching::Requirements;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub request_group_id: DbId,
    pub platform: Option<String>,
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
    pub factory_id: Option<DbId>,
    pub browser_id: Option<DbId>,
    pub locked_at: Option<Timestamp>,
    pub redirected_at: Option<Timestamp>,
    pub result_ref: Option<String>,
    pub created_at: Timestamp,
}

/// DTO for inserting a job into an existing group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateJob {
    pub platform: Option<String>,
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
}

/// A job joined with its group's options: everything a factory needs to know.
#[derive(Debug, Clone, FromRow)]
pub struct JobRequirementsRow {
    pub job_id: DbId,
    pub website_url: String,
    pub platform: Option<String>,
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
    pub width: Option<i32>,
    pub bits_per_pixel: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
    pub media: Option<String>,
    pub submitted_at: Timestamp,
}

impl JobRequirementsRow {
    pub fn requirements(&self) -> Requirements {
        Requirements {
            platform: self.platform.clone(),
            browser_group: self.browser_group.clone(),
            major: self.major,
            minor: self.minor,
            width: self.width,
            bits_per_pixel: self.bits_per_pixel,
            javascript: self.javascript.clone(),
            java: self.java.clone(),
            flash: self.flash.clone(),
            media: self.media.clone(),
        }
    }
}

/// The oldest eligible job for a factory, together with the factory
/// browser that matched it. Returned row-locked inside a claim transaction.
#[derive(Debug, Clone, FromRow)]
pub struct EligibleJob {
    pub browser_id: DbId,
    #[sqlx(flatten)]
    pub job: JobRequirementsRow,
}
