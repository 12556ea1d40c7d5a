//! Raw payload archive. Purely for audit and replay; nothing in the polling
//! path depends on a read succeeding.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use std::path::{Component, Path, PathBuf};

use crate::core::provider::SourceVariant;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("archive key not found: {0}")]
    NotFound(String),

    #[error("invalid archive key: {0}")]
    InvalidKey(String),

    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait SnapshotArchive: Send + Sync {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), ArchiveError>;
    async fn get(&self, key: &str) -> Result<Bytes, ArchiveError>;
}

/// Key under which the latest payload of one feed for one event is kept.
pub fn snapshot_key(date: NaiveDate, event_id: &str, variant: SourceVariant) -> String {
    format!(
        "{}/{}/{}.json",
        date.format("%Y%m%d"),
        event_id,
        variant.as_str()
    )
}

/// Filesystem-backed archive rooted at a directory.
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArchiveError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(ArchiveError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SnapshotArchive for FsArchive {
    async fn put(&self, key: &str, body: Bytes) -> Result<(), ArchiveError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &body).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ArchiveError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Bytes::from(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArchiveError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Archive used when archiving is disabled: writes vanish, reads miss.
pub struct NullArchive;

#[async_trait]
impl SnapshotArchive for NullArchive {
    async fn put(&self, _key: &str, _body: Bytes) -> Result<(), ArchiveError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ArchiveError> {
        Err(ArchiveError::NotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(
            snapshot_key(date, "E1", SourceVariant::Legacy),
            "20261019/E1/legacy.json"
        );
    }

    #[tokio::test]
    async fn put_then_get_returns_body() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        archive
            .put("20261019/E1/current.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        let body = archive.get("20261019/E1/current.json").await.unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        let err = archive.get("20261019/E9/legacy.json").await.unwrap_err();
        assert!(matches!(err, ArchiveError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_keys_escaping_root() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsArchive::new(dir.path());
        let err = archive
            .put("../outside.json", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn null_archive_never_hits() {
        NullArchive
            .put("k", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(matches!(
            NullArchive.get("k").await,
            Err(ArchiveError::NotFound(_))
        ));
    }
}
