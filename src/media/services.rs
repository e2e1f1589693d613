use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::repo::{MediaItem, MediaRepository};
use crate::storage::StorageClient;

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadItem {
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Image mime type of the upload, from the declared content type or else
    /// the file extension. `None` when neither names a supported image.
    pub fn image_mime(&self) -> Option<&'static str> {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .and_then(|ct| mime_from_content_type(&ct));
        declared.or_else(|| {
            let name = self.file_name.as_deref()?;
            let (_, ext) = name.rsplit_once('.')?;
            mime_from_ext(&ext.to_ascii_lowercase())
        })
    }
}

fn mime_from_content_type(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("image/jpeg"),
        "image/png" => Some("image/png"),
        "image/gif" => Some("image/gif"),
        "image/svg+xml" | "image/svg" => Some("image/svg+xml"),
        _ => None,
    }
}

fn mime_from_ext(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

/// Named per-account file collections backed by the object store.
#[derive(Clone)]
pub struct MediaLibrary {
    repo: Arc<dyn MediaRepository>,
    storage: Arc<dyn StorageClient>,
    url_ttl_secs: u64,
}

impl MediaLibrary {
    pub fn new(
        repo: Arc<dyn MediaRepository>,
        storage: Arc<dyn StorageClient>,
        url_ttl_secs: u64,
    ) -> Self {
        Self {
            repo,
            storage,
            url_ttl_secs,
        }
    }

    /// Drops every file of the collection. Returns how many were removed.
    pub async fn clear(&self, account_id: Uuid, collection: &str) -> anyhow::Result<usize> {
        let removed = self
            .repo
            .remove_all(account_id, collection)
            .await
            .with_context(|| format!("clear {} for {}", collection, account_id))?;
        let keys: Vec<String> = removed.into_iter().map(|m| m.object_key).collect();
        self.storage.delete_many(&keys).await?;
        debug!(%account_id, collection, count = keys.len(), "media collection cleared");
        Ok(keys.len())
    }

    pub async fn store(
        &self,
        account_id: Uuid,
        collection: &str,
        upload: UploadItem,
    ) -> anyhow::Result<MediaItem> {
        let content_type = upload
            .image_mime()
            .or(upload.content_type.as_deref())
            .unwrap_or("application/octet-stream")
            .to_string();
        let id = Uuid::new_v4();
        let ext = ext_from_mime(&content_type).unwrap_or("bin");
        let key = format!("accounts/{}/{}/{}.{}", account_id, collection, id, ext);
        let item = MediaItem {
            id,
            account_id,
            collection: collection.to_string(),
            object_key: key.clone(),
            content_type,
            size_bytes: upload.size() as i64,
            created_at: OffsetDateTime::now_utc(),
        };

        self.storage
            .put_object(&key, upload.body, &item.content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;

        if let Err(e) = self.repo.insert(&item).await {
            // row never landed; don't leave the object behind
            if let Err(cleanup) = self.storage.delete_object(&key).await {
                warn!(error = %cleanup, key = %key, "orphaned media object");
            }
            return Err(e.context(format!("record media {}", key)));
        }
        debug!(%account_id, collection, key = %key, "media stored");
        Ok(item)
    }

    /// URL of the newest file in the collection, if there is one.
    pub async fn url(&self, account_id: Uuid, collection: &str) -> anyhow::Result<Option<String>> {
        let items = self.repo.list(account_id, collection).await?;
        let Some(latest) = items.last() else {
            return Ok(None);
        };
        let url = self
            .storage
            .presign_get(&latest.object_key, self.url_ttl_secs)
            .await
            .with_context(|| format!("presign url for {}", latest.object_key))?;
        Ok(Some(url))
    }
}
