//! Asset storage producing permanent CDN-style references.
//!
//! Uploaded PDFs land under a filesystem root and are addressed by a
//! versioned URL (`<base>/raw/upload/v<ts>/<y>/<m>/<d>/<uuid>-<name>.pdf`)
//! that [`crate::infra::signing::UrlSigner`] later rewrites into signed,
//! time-limited variants.

use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AssetStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
}

/// Result of persisting an upload payload.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    /// Permanent reference recorded on the document row.
    pub file_url: String,
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

/// Filesystem-backed asset store standing in for the object-storage/CDN
/// collaborator.
#[derive(Debug)]
pub struct AssetStorage {
    root: PathBuf,
    public_base: Url,
}

impl AssetStorage {
    /// Initialise storage rooted at the provided directory, creating it if
    /// necessary.
    pub fn new(root: PathBuf, public_base: Url) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, public_base })
    }

    /// Persist the payload and return its permanent versioned URL plus
    /// integrity metadata.
    pub async fn store(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredAsset, AssetStorageError> {
        if data.is_empty() {
            return Err(AssetStorageError::EmptyPayload);
        }

        let stored_path = self.build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));
        let version = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        let file_url = format!(
            "{}/raw/upload/v{version}/{stored_path}",
            self.public_base.as_str().trim_end_matches('/')
        );

        Ok(StoredAsset {
            file_url,
            stored_path,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    /// Obtain the absolute filesystem path for a stored asset.
    pub fn absolute_path(&self, stored_path: &str) -> Result<PathBuf, AssetStorageError> {
        self.resolve(stored_path)
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, AssetStorageError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(AssetStorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }

    fn build_stored_path(&self, original_name: &str) -> String {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let identifier = Uuid::new_v4();
        let filename = sanitize_filename(original_name);
        format!("{year}/{:02}/{:02}/{identifier}-{filename}", month as u8, day)
    }
}

fn sanitize_filename(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("document");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "document".to_string();
    }
    format!("{base}.pdf")
}
