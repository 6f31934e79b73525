//! Disk-backed object store with three public buckets.
//!
//! Objects live at `{root}/{bucket}/{key}` and are served unauthenticated
//! under `{public_base}/storage/{bucket}/{key}`, so a stored URL can be handed
//! straight to a browser.

pub mod keys;

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use anyhow::{Result, bail};
use tokio::fs;
use tracing::{info, warn};

use backstage_types::models::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    EventDocuments,
    EventMedia,
    Avatars,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::EventDocuments, Bucket::EventMedia, Bucket::Avatars];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::EventDocuments => "event-documents",
            Bucket::EventMedia => "event-media",
            Bucket::Avatars => "avatars",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Bucket {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| UnknownVariant::new("bucket", s))
    }
}

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

pub struct Storage {
    root: PathBuf,
    public_base: String,
}

impl Storage {
    pub async fn new(root: PathBuf, public_base: &str) -> Result<Self> {
        for bucket in Bucket::ALL {
            fs::create_dir_all(root.join(bucket.name())).await?;
        }
        info!("Object storage directory: {}", root.display());
        Ok(Self {
            root,
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!("{}/storage/{}/{}", self.public_base, bucket.name(), key)
    }

    /// Path on disk for an object. Keys are relative, slash separated and
    /// may not climb out of their bucket.
    pub fn object_path(&self, bucket: Bucket, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains('\\') {
            bail!("Invalid object key: {key:?}");
        }
        let rel = Path::new(key);
        if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("Invalid object key: {key:?}");
        }
        Ok(self.root.join(bucket.name()).join(rel))
    }

    pub async fn put_object(&self, bucket: Bucket, key: &str, data: &[u8]) -> Result<StoredObject> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        info!("Stored {}/{} ({} bytes)", bucket, key, data.len());
        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(bucket, key),
        })
    }

    /// Open an object for streaming. `None` when it does not exist.
    pub async fn open_object(&self, bucket: Bucket, key: &str) -> Result<Option<(fs::File, u64)>> {
        let path = self.object_path(bucket, key)?;
        match fs::File::open(&path).await {
            Ok(file) => {
                let len = file.metadata().await?.len();
                Ok(Some((file, len)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_object(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an object. A missing object is not an error.
    pub async fn remove_object(&self, bucket: Bucket, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed {}/{}", bucket, key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Object {}/{} already gone", bucket, key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf(), "http://localhost:3000/")
            .await
            .unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn put_read_remove() {
        let (_dir, storage) = storage().await;
        let stored = storage
            .put_object(Bucket::EventDocuments, "ev1/invoice-1.pdf", b"%PDF")
            .await
            .unwrap();
        assert_eq!(
            stored.url,
            "http://localhost:3000/storage/event-documents/ev1/invoice-1.pdf"
        );
        assert_eq!(
            storage.read_object(Bucket::EventDocuments, &stored.key).await.unwrap().as_deref(),
            Some(&b"%PDF"[..])
        );
        // buckets are separate namespaces
        assert!(storage.read_object(Bucket::EventMedia, &stored.key).await.unwrap().is_none());

        storage.remove_object(Bucket::EventDocuments, &stored.key).await.unwrap();
        assert!(storage.read_object(Bucket::EventDocuments, &stored.key).await.unwrap().is_none());
        // second removal is tolerated
        storage.remove_object(Bucket::EventDocuments, &stored.key).await.unwrap();
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_bucket() {
        let (_dir, storage) = storage().await;
        for key in ["../secrets", "/etc/passwd", "a/../../b", "a\\b", "", "./x"] {
            assert!(storage.object_path(Bucket::Avatars, key).is_err(), "{key}");
        }
        assert!(storage.object_path(Bucket::Avatars, "u-1.png").is_ok());
    }

    #[test]
    fn bucket_names_round_trip() {
        for bucket in Bucket::ALL {
            assert_eq!(bucket.name().parse::<Bucket>().unwrap(), bucket);
        }
        assert!("private".parse::<Bucket>().is_err());
    }
}
