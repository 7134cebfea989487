//! Factory (screenshot worker) models and provisioning DTOs.

use serde::{Deserialize, Serialize};
use shotserver_core::matching::BrowserCapability;
use shotserver_core::types::{DbId, Timestamp};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity structs (match database tables)
// ---------------------------------------------------------------------------

/// A row from the `factories` table.
///
/// `password_hash` is credential-equivalent and must never be serialized.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Factory {
    pub id: DbId,
    pub name: String,
    pub salt: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub platform: String,
    pub is_active: bool,
    pub last_poll_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// A row from the `factory_browsers` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FactoryBrowser {
    pub id: DbId,
    pub factory_id: DbId,
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
}

impl From<FactoryBrowser> for BrowserCapability {
    fn from(row: FactoryBrowser) -> Self {
        BrowserCapability {
            browser_id: row.id,
            browser_group: row.browser_group,
            major: row.major,
            minor: row.minor,
            javascript: row.javascript,
            java: row.java,
            flash: row.flash,
        }
    }
}

// ---------------------------------------------------------------------------
// Provisioning DTOs
// ---------------------------------------------------------------------------

/// DTO for provisioning a factory. `password_hash` is `H(salt + secret)`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFactory {
    pub name: String,
    pub salt: String,
    pub password_hash: String,
    pub platform: String,
}

/// DTO for declaring a browser installed on a factory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateFactoryBrowser {
    pub browser_group: String,
    pub major: Option<i32>,
    pub minor: Option<i32>,
    pub javascript: Option<String>,
    pub java: Option<String>,
    pub flash: Option<String>,
}
