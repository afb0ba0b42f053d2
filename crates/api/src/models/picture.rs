//! Profile picture domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use userhub_core::{AccountId, ImageType, PictureId};

/// Metadata for the single picture an account may own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub id: PictureId,
    pub account_id: AccountId,
    /// Name the client uploaded the file under.
    pub file_name: String,
    /// Object store key, `{account_id}/{uuid}_{name}`.
    pub storage_key: String,
    pub content_type: ImageType,
    /// Public URL of the blob at upload time.
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Picture JSON served to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PictureView {
    pub id: PictureId,
    pub file_name: String,
    pub url: String,
    pub upload_date: DateTime<Utc>,
    pub user_id: AccountId,
}

impl From<&Picture> for PictureView {
    fn from(picture: &Picture) -> Self {
        Self {
            id: picture.id,
            file_name: picture.file_name.clone(),
            url: picture.url.clone(),
            upload_date: picture.uploaded_at,
            user_id: picture.account_id,
        }
    }
}
