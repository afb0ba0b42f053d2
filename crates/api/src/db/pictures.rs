//! `PostgreSQL` picture metadata repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use userhub_core::{AccountId, ImageType, PictureId};

use super::{PictureRepository, RepositoryError, map_unique_violation};
use crate::models::Picture;

const PICTURE_COLUMNS: &str =
    "id, account_id, file_name, storage_key, content_type, url, uploaded_at";

#[derive(sqlx::FromRow)]
struct PictureRow {
    id: Uuid,
    account_id: i64,
    file_name: String,
    storage_key: String,
    content_type: String,
    url: String,
    uploaded_at: DateTime<Utc>,
}

impl TryFrom<PictureRow> for Picture {
    type Error = RepositoryError;

    fn try_from(row: PictureRow) -> Result<Self, Self::Error> {
        let content_type = ImageType::from_mime(&row.content_type).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "invalid content type in database: {}",
                row.content_type
            ))
        })?;

        Ok(Self {
            id: PictureId::from_uuid(row.id),
            account_id: AccountId::new(row.account_id),
            file_name: row.file_name,
            storage_key: row.storage_key,
            content_type,
            url: row.url,
            uploaded_at: row.uploaded_at,
        })
    }
}

/// Picture repository backed by the `profile_pictures` table.
#[derive(Clone)]
pub struct PgPictureRepository {
    pool: PgPool,
}

impl PgPictureRepository {
    /// Create a new picture repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PictureRepository for PgPictureRepository {
    async fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Option<Picture>, RepositoryError> {
        let row = sqlx::query_as::<_, PictureRow>(&format!(
            "SELECT {PICTURE_COLUMNS} FROM profile_pictures WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Picture::try_from).transpose()
    }

    async fn save(&self, picture: &Picture) -> Result<Picture, RepositoryError> {
        let row = sqlx::query_as::<_, PictureRow>(&format!(
            r"
            INSERT INTO profile_pictures
                (id, account_id, file_name, storage_key, content_type, url, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (account_id) DO UPDATE SET
                id = EXCLUDED.id,
                file_name = EXCLUDED.file_name,
                storage_key = EXCLUDED.storage_key,
                content_type = EXCLUDED.content_type,
                url = EXCLUDED.url,
                uploaded_at = EXCLUDED.uploaded_at
            RETURNING {PICTURE_COLUMNS}
            "
        ))
        .bind(picture.id)
        .bind(picture.account_id)
        .bind(&picture.file_name)
        .bind(&picture.storage_key)
        .bind(picture.content_type.as_mime())
        .bind(&picture.url)
        .bind(picture.uploaded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "storage key already in use"))?;

        Picture::try_from(row)
    }

    async fn delete(&self, id: PictureId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM profile_pictures WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
