//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{
    NewUpdate, NewUpdateAsset, ProjectRow, UpdateAssetRow, UpdateListFilter, UpdateRow,
    UpdateToInstallRow, UpdateWithProtocolRow,
};
use crate::store::{AssetRepo, MetadataStore, ProjectRepo, UpdateRepo};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use updraft_core::config::PostgresConfig;
use updraft_core::{UpdateProtocol, UpdateStatus};
use uuid::Uuid;

/// Embedded schema, applied by `migrate()`.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const UPDATE_COLUMNS: &str =
    "id, project_id, runtime_version, channel, message, status::text AS status, created_at";

const ASSET_COLUMNS: &str = "id, update_id, storage_object_path, content_type, extension, \
     content_md5, content_sha256, is_launch_asset, is_archive, platform, content_length, created_at";

/// PostgreSQL-backed metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Connect a pool and apply migrations.
    pub async fn connect(config: &PostgresConfig) -> MetadataResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.dsn)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl ProjectRepo for PostgresStore {
    async fn create_project(
        &self,
        id: Uuid,
        name: &str,
        update_protocol: UpdateProtocol,
    ) -> MetadataResult<ProjectRow> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "INSERT INTO projects (id, name, update_protocol)
             VALUES ($1, $2, $3::update_protocol)
             RETURNING id, name, update_protocol::text AS update_protocol, created_at",
        )
        .bind(id)
        .bind(name)
        .bind(update_protocol.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_project(&self, id: Uuid) -> MetadataResult<Option<ProjectRow>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, name, update_protocol::text AS update_protocol, created_at
             FROM projects WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl UpdateRepo for PostgresStore {
    async fn create_update(
        &self,
        update: &NewUpdate,
        expo_app_config: Option<&serde_json::Value>,
    ) -> MetadataResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO updates (id, project_id, runtime_version, channel, message)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(update.id)
        .bind(update.project_id)
        .bind(&update.runtime_version)
        .bind(&update.channel)
        .bind(&update.message)
        .execute(&mut *tx)
        .await?;

        if let Some(app_config) = expo_app_config {
            sqlx::query(
                "INSERT INTO update_metadata (id, update_id, expo_app_config)
                 VALUES ($1, $2, $3)",
            )
            .bind(Uuid::now_v7())
            .bind(update.id)
            .bind(app_config)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_update_status(
        &self,
        update_id: Uuid,
        status: UpdateStatus,
    ) -> MetadataResult<UpdateRow> {
        let query = format!(
            "UPDATE updates SET status = $2::update_status WHERE id = $1 RETURNING {UPDATE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UpdateRow>(&query)
            .bind(update_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| MetadataError::NotFound(format!("update {update_id}")))
    }

    async fn get_update(
        &self,
        project_id: Uuid,
        update_id: Uuid,
    ) -> MetadataResult<Option<UpdateRow>> {
        let query =
            format!("SELECT {UPDATE_COLUMNS} FROM updates WHERE id = $1 AND project_id = $2");
        let row = sqlx::query_as::<_, UpdateRow>(&query)
            .bind(update_id)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn get_update_with_protocol(
        &self,
        update_id: Uuid,
    ) -> MetadataResult<Option<UpdateWithProtocolRow>> {
        let row = sqlx::query_as::<_, UpdateWithProtocolRow>(
            "SELECT u.id, u.project_id, u.runtime_version, u.channel, u.message,
                    u.status::text AS status, u.created_at,
                    p.update_protocol::text AS update_protocol
             FROM updates u
             JOIN projects p ON p.id = u.project_id
             WHERE u.id = $1",
        )
        .bind(update_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_updates(
        &self,
        project_id: Uuid,
        filter: &UpdateListFilter,
        limit: i64,
    ) -> MetadataResult<Vec<UpdateRow>> {
        let query = format!(
            "SELECT {UPDATE_COLUMNS} FROM updates
             WHERE project_id = $1
               AND ($2::text IS NULL OR status::text = $2)
               AND ($3::text IS NULL OR runtime_version = $3)
               AND ($4::text IS NULL OR channel = $4)
             ORDER BY created_at DESC
             LIMIT $5"
        );
        let rows = sqlx::query_as::<_, UpdateRow>(&query)
            .bind(project_id)
            .bind(&filter.status)
            .bind(&filter.runtime_version)
            .bind(&filter.channel)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn latest_published_and_canceled(
        &self,
        project_id: Uuid,
        runtime_version: &str,
        channel: &str,
        platform: &str,
    ) -> MetadataResult<Vec<UpdateToInstallRow>> {
        let rows = sqlx::query_as::<_, UpdateToInstallRow>(
            "SELECT DISTINCT ON (u.status)
                    u.id, u.project_id, u.runtime_version, u.channel, u.message,
                    u.status::text AS status, u.created_at,
                    a.content_sha256
             FROM updates u
             LEFT JOIN LATERAL (
                 SELECT content_sha256
                 FROM update_assets
                 WHERE update_id = u.id
                   AND platform = $4
                   AND (is_archive OR is_launch_asset)
                 ORDER BY is_archive DESC
                 LIMIT 1
             ) a ON true
             WHERE u.project_id = $1
               AND u.runtime_version = $2
               AND u.channel = $3
               AND u.status IN ('published', 'canceled')
             ORDER BY u.status, u.created_at DESC",
        )
        .bind(project_id)
        .bind(runtime_version)
        .bind(channel)
        .bind(platform)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl AssetRepo for PostgresStore {
    async fn insert_assets(&self, assets: &[NewUpdateAsset]) -> MetadataResult<u64> {
        if assets.is_empty() {
            return Ok(0);
        }

        let mut ids = Vec::with_capacity(assets.len());
        let mut update_ids = Vec::with_capacity(assets.len());
        let mut paths = Vec::with_capacity(assets.len());
        let mut content_types = Vec::with_capacity(assets.len());
        let mut extensions = Vec::with_capacity(assets.len());
        let mut md5s = Vec::with_capacity(assets.len());
        let mut sha256s = Vec::with_capacity(assets.len());
        let mut launch_flags = Vec::with_capacity(assets.len());
        let mut archive_flags = Vec::with_capacity(assets.len());
        let mut platforms = Vec::with_capacity(assets.len());
        let mut lengths = Vec::with_capacity(assets.len());
        for asset in assets {
            ids.push(asset.id);
            update_ids.push(asset.update_id);
            paths.push(asset.storage_object_path.clone());
            content_types.push(asset.content_type.clone());
            extensions.push(asset.extension.clone());
            md5s.push(asset.content_md5.clone());
            sha256s.push(asset.content_sha256.clone());
            launch_flags.push(asset.is_launch_asset);
            archive_flags.push(asset.is_archive);
            platforms.push(asset.platform.clone());
            lengths.push(asset.content_length);
        }

        let result = sqlx::query(
            "INSERT INTO update_assets (
                 id, update_id, storage_object_path, content_type, extension,
                 content_md5, content_sha256, is_launch_asset, is_archive,
                 platform, content_length
             )
             SELECT * FROM UNNEST(
                 $1::uuid[], $2::uuid[], $3::text[], $4::text[], $5::text[],
                 $6::text[], $7::text[], $8::bool[], $9::bool[],
                 $10::text[], $11::bigint[]
             )
             ON CONFLICT (update_id, storage_object_path) DO UPDATE SET
                 content_type = EXCLUDED.content_type,
                 extension = EXCLUDED.extension,
                 content_md5 = EXCLUDED.content_md5,
                 content_sha256 = EXCLUDED.content_sha256,
                 is_launch_asset = EXCLUDED.is_launch_asset,
                 is_archive = EXCLUDED.is_archive,
                 content_length = EXCLUDED.content_length",
        )
        .bind(&ids)
        .bind(&update_ids)
        .bind(&paths)
        .bind(&content_types)
        .bind(&extensions)
        .bind(&md5s)
        .bind(&sha256s)
        .bind(&launch_flags)
        .bind(&archive_flags)
        .bind(&platforms)
        .bind(&lengths)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn assets_by_platform(
        &self,
        update_id: Uuid,
        platform: &str,
    ) -> MetadataResult<Vec<UpdateAssetRow>> {
        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM update_assets
             WHERE update_id = $1 AND platform = $2
             ORDER BY created_at, storage_object_path"
        );
        let rows = sqlx::query_as::<_, UpdateAssetRow>(&query)
            .bind(update_id)
            .bind(platform)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn launch_asset_or_archive(
        &self,
        update_id: Uuid,
        platform: &str,
    ) -> MetadataResult<Option<UpdateAssetRow>> {
        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM update_assets
             WHERE update_id = $1 AND platform = $2
               AND (is_archive OR is_launch_asset)
             ORDER BY is_archive DESC
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, UpdateAssetRow>(&query)
            .bind(update_id)
            .bind(platform)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
