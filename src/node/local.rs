//! Local-disk handles
//!
//! Used as staging files for cross-backend copies and as download/upload
//! endpoints.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::connector::replace_file;
use crate::error::Result;
use crate::node::{Addressing, DirectoryNode, FileNode};

/// A file on the local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileNode for LocalFile {
    fn path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn basename(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    fn addressing(&self) -> Addressing<'_> {
        Addressing::Local(&self.path)
    }

    async fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }

    async fn write(&self, data: Bytes) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        replace_file(&self.path, &data)?;
        Ok(())
    }

    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn size(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    async fn delete(&self) -> Result<()> {
        Ok(tokio::fs::remove_file(&self.path).await?)
    }

    async fn copy_to(&self, dest: &dyn FileNode) -> Result<()> {
        match dest.addressing() {
            Addressing::Local(target) => {
                tokio::fs::copy(&self.path, target).await?;
                Ok(())
            }
            _ => dest.copy_from(self).await,
        }
    }

    async fn copy_from(&self, source: &dyn FileNode) -> Result<()> {
        match source.addressing() {
            Addressing::Local(origin) => {
                tokio::fs::copy(origin, &self.path).await?;
                Ok(())
            }
            _ => source.copy_to(self).await,
        }
    }
}

/// A directory on the local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirectory {
    path: PathBuf,
}

impl LocalDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectoryNode for LocalDirectory {
    fn path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    async fn exists(&self) -> Result<bool> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn make(&self) -> Result<bool> {
        tokio::fs::create_dir_all(&self.path).await?;
        Ok(true)
    }

    fn child_file(&self, relative: &str) -> Box<dyn FileNode> {
        Box::new(LocalFile::new(self.path.join(relative)))
    }

    fn child_directory(&self, relative: &str) -> Box<dyn DirectoryNode> {
        Box::new(LocalDirectory::new(self.path.join(relative)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_round_trip_and_copy() {
        let dir = tempfile::tempdir().unwrap();
        let a = LocalFile::new(dir.path().join("nested/a.txt"));
        a.write(Bytes::from_static(b"local")).await.unwrap();
        assert!(a.exists().await.unwrap());
        assert_eq!(a.size().await.unwrap(), 5);
        assert_eq!(a.basename(), "a.txt");

        let b = LocalFile::new(dir.path().join("b.txt"));
        a.copy_to(&b).await.unwrap();
        assert_eq!(&b.read().await.unwrap()[..], b"local");

        b.delete().await.unwrap();
        assert!(!b.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_local_directory_children() {
        let dir = tempfile::tempdir().unwrap();
        let root = LocalDirectory::new(dir.path().join("tree"));
        assert!(!root.exists().await.unwrap());
        assert!(root.make().await.unwrap());
        assert!(root.exists().await.unwrap());

        let sub = root.child_directory("x/y");
        sub.make().await.unwrap();
        assert!(sub.exists().await.unwrap());
        assert!(root.child_file("x/y/z").path().ends_with("z"));
    }
}
