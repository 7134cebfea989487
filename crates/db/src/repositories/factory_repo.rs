//! Repository for `factories` and their capability tables.
//!
//! Provisioning writes (`create`, `add_*`) exist for account management and
//! test fixtures; the dispatcher itself only reads, plus `touch_last_poll`.

use shotserver_core::matching::{BrowserCapability, Capabilities};
use shotserver_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::factory::{CreateFactory, CreateFactoryBrowser, Factory, FactoryBrowser};

/// Column list for `factories` queries.
const COLUMNS: &str =
    "id, name, salt, password_hash, platform, is_active, last_poll_at, created_at";

/// Column list for `factory_browsers` queries.
const BROWSER_COLUMNS: &str = "\
    id, factory_id, browser_group, major, minor, javascript, java, flash, \
    is_active, created_at";

pub struct FactoryRepo;

impl FactoryRepo {
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Factory>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM factories WHERE name = $1");
        sqlx::query_as::<_, Factory>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Factory>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM factories WHERE id = $1");
        sqlx::query_as::<_, Factory>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Provision a factory. Fails with `uq_factories_name` on a duplicate name.
    pub async fn create(pool: &PgPool, input: &CreateFactory) -> Result<Factory, sqlx::Error> {
        let query = format!(
            "INSERT INTO factories (name, salt, password_hash, platform) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Factory>(&query)
            .bind(&input.name)
            .bind(&input.salt)
            .bind(&input.password_hash)
            .bind(&input.platform)
            .fetch_one(pool)
            .await
    }

    pub async fn set_active(pool: &PgPool, id: DbId, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE factories SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_browser(
        pool: &PgPool,
        factory_id: DbId,
        input: &CreateFactoryBrowser,
    ) -> Result<FactoryBrowser, sqlx::Error> {
        let query = format!(
            "INSERT INTO factory_browsers \
                 (factory_id, browser_group, major, minor, javascript, java, flash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {BROWSER_COLUMNS}"
        );
        sqlx::query_as::<_, FactoryBrowser>(&query)
            .bind(factory_id)
            .bind(&input.browser_group)
            .bind(input.major)
            .bind(input.minor)
            .bind(&input.javascript)
            .bind(&input.java)
            .bind(&input.flash)
            .fetch_one(pool)
            .await
    }

    pub async fn add_screen_size(
        pool: &PgPool,
        factory_id: DbId,
        width: i32,
        height: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO factory_screen_sizes (factory_id, width, height) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(factory_id)
        .bind(width)
        .bind(height)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn add_color_depth(
        pool: &PgPool,
        factory_id: DbId,
        bits_per_pixel: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO factory_color_depths (factory_id, bits_per_pixel) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(factory_id)
        .bind(bits_per_pixel)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn add_media(
        pool: &PgPool,
        factory_id: DbId,
        media: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO factory_media (factory_id, media) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(factory_id)
        .bind(media)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Active browsers installed on a factory, ordered by id.
    pub async fn list_browsers(
        pool: &PgPool,
        factory_id: DbId,
    ) -> Result<Vec<FactoryBrowser>, sqlx::Error> {
        let query = format!(
            "SELECT {BROWSER_COLUMNS} FROM factory_browsers \
             WHERE factory_id = $1 AND is_active \
             ORDER BY id"
        );
        sqlx::query_as::<_, FactoryBrowser>(&query)
            .bind(factory_id)
            .fetch_all(pool)
            .await
    }

    /// Load everything the factory declares it can render.
    pub async fn capabilities(
        pool: &PgPool,
        factory: &Factory,
    ) -> Result<Capabilities, sqlx::Error> {
        let browsers = Self::list_browsers(pool, factory.id)
            .await?
            .into_iter()
            .map(BrowserCapability::from)
            .collect();

        let screen_widths: Vec<i32> = sqlx::query_scalar(
            "SELECT DISTINCT width FROM factory_screen_sizes WHERE factory_id = $1 ORDER BY width",
        )
        .bind(factory.id)
        .fetch_all(pool)
        .await?;

        let color_depths: Vec<i32> = sqlx::query_scalar(
            "SELECT bits_per_pixel FROM factory_color_depths \
             WHERE factory_id = $1 ORDER BY bits_per_pixel",
        )
        .bind(factory.id)
        .fetch_all(pool)
        .await?;

        let media: Vec<String> = sqlx::query_scalar(
            "SELECT media FROM factory_media WHERE factory_id = $1 ORDER BY media",
        )
        .bind(factory.id)
        .fetch_all(pool)
        .await?;

        Ok(Capabilities {
            factory_id: factory.id,
            platform: factory.platform.clone(),
            browsers,
            screen_widths,
            color_depths,
            media,
        })
    }

    pub async fn touch_last_poll(
        pool: &PgPool,
        factory_id: DbId,
        now: Timestamp,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE factories SET last_poll_at = $2 WHERE id = $1")
            .bind(factory_id)
            .bind(now)
            .execute(pool)
            .await?;
        Ok(())
    }
}
