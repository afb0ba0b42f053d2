//! Profile picture service.
//!
//! A picture lives in two places with no shared transaction: the blob in the
//! object store and its metadata row in the database. Every operation
//! orders its two writes so the database never holds a row whose blob is
//! known to be gone:
//!
//! - upload writes the blob first and the row second
//! - delete removes the blob first and the row second, and keeps the row
//!   when the blob delete fails
//!
//! A crash between the two steps of an upload leaves a blob with no row,
//! which costs storage but is never visible to clients. The reverse case, a
//! row whose blob vanished out of band, is repaired when [`PictureService::get`]
//! notices the blob is missing.
//!
//! Two uploads racing for the same account are not serialized. Both
//! succeed and the row save that lands last wins; the blob of the other
//! upload is left behind with no row, like the crash case above.
//!
//! Each public operation counts its outcome through the [`Metrics`] port,
//! as do orphan repairs and blob discards.

mod error;

pub use error::PictureError;

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use userhub_core::{AccountId, Email, ImageType, PictureId};

use crate::db::PictureRepository;
use crate::metrics::{Metrics, Operation, Outcome};
use crate::models::Picture;
use crate::services::accounts::AccountService;
use crate::storage::BlobStore;

/// Longest sanitized file name kept in a storage key.
const MAX_KEY_FILE_NAME: usize = 100;

/// Fallback for uploads without a usable file name.
const DEFAULT_FILE_NAME: &str = "upload";

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct PictureUpload {
    /// Name the client sent, if any.
    pub file_name: Option<String>,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Picture service.
#[derive(Clone)]
pub struct PictureService {
    accounts: AccountService,
    pictures: Arc<dyn PictureRepository>,
    blobs: Arc<dyn BlobStore>,
    metrics: Arc<dyn Metrics>,
    max_bytes: usize,
}

impl PictureService {
    /// Create a new picture service.
    #[must_use]
    pub fn new(
        accounts: AccountService,
        pictures: Arc<dyn PictureRepository>,
        blobs: Arc<dyn BlobStore>,
        metrics: Arc<dyn Metrics>,
        max_bytes: usize,
    ) -> Self {
        Self {
            accounts,
            pictures,
            blobs,
            metrics,
            max_bytes,
        }
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store a new picture for the account, replacing any existing one.
    ///
    /// # Errors
    ///
    /// - `PictureError::Validation` for an empty, oversized or non-image upload
    /// - the account gate errors (`NotFound`, `Unverified`)
    /// - `PictureError::Storage` if the old blob cannot be removed or the new
    ///   one cannot be written; the previous picture is then left intact
    /// - `PictureError::Repository` if the row cannot be saved; the new blob
    ///   is removed again
    #[instrument(skip(self, upload), fields(email = %email, size = upload.bytes.len()))]
    pub async fn upload(&self, email: &Email, upload: PictureUpload) -> Result<Picture, PictureError> {
        let result = self.store(email, upload).await;
        self.metrics
            .record(Operation::PictureUpload, Outcome::of(&result));
        result
    }

    /// The account's current picture.
    ///
    /// If the row exists but its blob does not, the row is deleted and
    /// `NotFound` returned.
    ///
    /// # Errors
    ///
    /// Returns `PictureError::NotFound` when there is no live picture, the
    /// account gate errors, and `PictureError::Storage` if the existence
    /// check fails.
    pub async fn get(&self, email: &Email) -> Result<Picture, PictureError> {
        let result = self.fetch(email).await;
        self.metrics
            .record(Operation::PictureGet, Outcome::of(&result));
        result
    }

    /// Delete the account's picture.
    ///
    /// # Errors
    ///
    /// Returns `PictureError::NotFound` when the account has no picture,
    /// the account gate errors, and `PictureError::Storage` if the blob
    /// cannot be removed (the row is kept).
    #[instrument(skip(self), fields(email = %email))]
    pub async fn delete(&self, email: &Email) -> Result<(), PictureError> {
        let result = self.remove_current(email).await;
        self.metrics
            .record(Operation::PictureDelete, Outcome::of(&result));
        result
    }

    async fn store(&self, email: &Email, upload: PictureUpload) -> Result<Picture, PictureError> {
        let content_type = self.validate(&upload)?;
        let account = self.accounts.get_authenticated_account(email).await?;

        if let Some(existing) = self.pictures.find_by_account(account.id).await? {
            self.remove(&existing).await?;
            tracing::info!(
                account_id = %account.id,
                storage_key = %existing.storage_key,
                "Replaced existing picture"
            );
        }

        let file_name = client_file_name(upload.file_name.as_deref());
        let storage_key = storage_key(account.id, Uuid::new_v4(), &file_name);

        self.blobs
            .put(&storage_key, upload.bytes, content_type.as_mime())
            .await?;

        let picture = Picture {
            id: PictureId::generate(),
            account_id: account.id,
            url: self.blobs.public_url(&storage_key),
            file_name,
            storage_key,
            content_type,
            uploaded_at: Utc::now(),
        };

        match self.pictures.save(&picture).await {
            Ok(saved) => {
                tracing::info!(
                    account_id = %saved.account_id,
                    picture_id = %saved.id,
                    storage_key = %saved.storage_key,
                    "Picture uploaded"
                );
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(
                    account_id = %account.id,
                    storage_key = %picture.storage_key,
                    error = %e,
                    "Failed to save picture row"
                );
                self.discard_blob(&picture.storage_key).await;
                Err(e.into())
            }
        }
    }

    async fn fetch(&self, email: &Email) -> Result<Picture, PictureError> {
        let account = self.accounts.get_authenticated_account(email).await?;
        let picture = self
            .pictures
            .find_by_account(account.id)
            .await?
            .ok_or(PictureError::NotFound)?;

        if !self.blobs.exists(&picture.storage_key).await? {
            tracing::warn!(
                account_id = %account.id,
                storage_key = %picture.storage_key,
                "Picture blob missing, removing orphaned row"
            );
            let repaired = self.pictures.delete(picture.id).await;
            self.metrics
                .record(Operation::OrphanRepair, Outcome::of(&repaired));
            repaired?;
            return Err(PictureError::NotFound);
        }

        Ok(picture)
    }

    async fn remove_current(&self, email: &Email) -> Result<(), PictureError> {
        let account = self.accounts.get_authenticated_account(email).await?;
        let picture = self
            .pictures
            .find_by_account(account.id)
            .await?
            .ok_or(PictureError::NotFound)?;

        self.remove(&picture).await?;
        tracing::info!(
            account_id = %account.id,
            storage_key = %picture.storage_key,
            "Picture deleted"
        );
        Ok(())
    }

    fn validate(&self, upload: &PictureUpload) -> Result<ImageType, PictureError> {
        if upload.bytes.is_empty() {
            return Err(PictureError::Validation("file is empty".to_string()));
        }
        if upload.bytes.len() > self.max_bytes {
            return Err(PictureError::Validation(format!(
                "file exceeds the {} byte limit",
                self.max_bytes
            )));
        }

        let declared = upload.content_type.as_deref().unwrap_or_default();
        ImageType::from_mime(declared).ok_or_else(|| {
            PictureError::Validation(format!(
                "unsupported content type {declared:?}, expected one of {}",
                ImageType::ALL.map(|t| t.as_mime()).join(", ")
            ))
        })
    }

    /// Blob first, then row.
    async fn remove(&self, picture: &Picture) -> Result<(), PictureError> {
        self.blobs.delete(&picture.storage_key).await?;
        self.pictures.delete(picture.id).await?;
        Ok(())
    }

    async fn discard_blob(&self, key: &str) {
        let discarded = self.blobs.delete(key).await;
        self.metrics
            .record(Operation::BlobDiscard, Outcome::of(&discarded));
        if let Err(e) = discarded {
            tracing::warn!(storage_key = %key, error = %e, "Failed to discard unreferenced blob");
        }
    }
}

/// Last path component of the client's file name.
fn client_file_name(raw: Option<&str>) -> String {
    raw.and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| DEFAULT_FILE_NAME.to_string(), str::to_string)
}

/// `{account_id}/{uuid}_{sanitized name}`
fn storage_key(account_id: AccountId, nonce: Uuid, file_name: &str) -> String {
    let mut sanitized: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_KEY_FILE_NAME)
        .collect();
    if sanitized.trim_matches('.').is_empty() {
        sanitized = DEFAULT_FILE_NAME.to_string();
    }
    format!("{account_id}/{nonce}_{sanitized}")
}
