use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// On-disk storage for message attachments.
///
/// Each attachment is a single flat file at `{dir}/{attachment_id}`; the
/// original file name only lives in the database.
pub struct Storage {
    dir: PathBuf,
}

/// Size and checksum of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub size: i64,
    pub sha256: String,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Attachment storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    /// Path to the file for a given attachment. Only UUID ids are accepted so
    /// an id can never escape the storage directory.
    pub fn file_path(&self, attachment_id: &str) -> Result<PathBuf> {
        if attachment_id.parse::<Uuid>().is_err() {
            bail!("Invalid attachment id: {}", attachment_id);
        }
        Ok(self.dir.join(attachment_id))
    }

    pub async fn write(&self, attachment_id: &str, data: &[u8]) -> Result<StoredFile> {
        let path = self.file_path(attachment_id)?;
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(StoredFile {
            size: data.len() as i64,
            sha256: hex::encode(Sha256::digest(data)),
        })
    }

    pub async fn read(&self, attachment_id: &str) -> Result<Vec<u8>> {
        let path = self.file_path(attachment_id)?;
        Ok(fs::read(&path).await?)
    }

    /// Copy a stored attachment under a new id (used when forwarding).
    pub async fn copy(&self, from_id: &str, to_id: &str) -> Result<()> {
        let from = self.file_path(from_id)?;
        let to = self.file_path(to_id)?;
        fs::copy(&from, &to).await?;
        Ok(())
    }

    /// Delete an attachment's file from disk.
    pub async fn delete_file(&self, attachment_id: &str) -> Result<()> {
        let path = self.file_path(attachment_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted attachment file {}", attachment_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Attachment file {} already gone", attachment_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of several files; failures are logged.
    pub async fn delete_all(&self, attachment_ids: &[String]) {
        for id in attachment_ids {
            if let Err(e) = self.delete_file(id).await {
                warn!("Failed to delete attachment {}: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("atlas-storage-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn write_read_copy_delete() {
        let dir = temp_dir();
        let storage = Storage::new(dir.clone()).await.unwrap();
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();

        let stored = storage.write(&a, b"file_content").await.unwrap();
        assert_eq!(stored.size, 12);
        assert_eq!(stored.sha256.len(), 64);

        storage.copy(&a, &b).await.unwrap();
        assert_eq!(storage.read(&b).await.unwrap(), b"file_content");

        storage.delete_file(&a).await.unwrap();
        assert!(storage.read(&a).await.is_err());
        // Deleting twice is not an error.
        storage.delete_file(&a).await.unwrap();

        fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_ids_that_are_not_uuids() {
        let dir = temp_dir();
        let storage = Storage::new(dir.clone()).await.unwrap();
        assert!(storage.file_path("../etc/passwd").is_err());
        assert!(storage.write("not-a-uuid", b"x").await.is_err());
        fs::remove_dir_all(dir).await.unwrap();
    }
}
