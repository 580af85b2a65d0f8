//! Object-store file handle

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::connector::{Acl, RequestHeaders};
use crate::error::Result;
use crate::node::{stage_copy, Addressing, Directory, DriverSlot, FileNode};
use crate::path;

/// A file stored as a single object
#[derive(Debug, Clone)]
pub struct File {
    pub(crate) directory: String,
    pub(crate) basename: String,
    pub(crate) driver: DriverSlot,
}

super::driver_bound_handle!(File);

impl File {
    /// Handle for `path`, not bound to a driver yet
    pub fn new(path: &str) -> Self {
        let (directory, basename) = path::split(path);
        Self {
            directory,
            basename,
            driver: DriverSlot::Unresolved,
        }
    }

    pub fn path(&self) -> String {
        path::join(&self.directory, &self.basename)
    }

    /// Path of the containing directory
    pub fn dirname(&self) -> &str {
        &self.directory
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Extension without the dot, if the name has one
    pub fn extension(&self) -> Option<&str> {
        match self.basename.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&self.basename[idx + 1..]),
        }
    }

    /// Handle of the containing directory, sharing this file's driver
    pub fn parent(&self) -> Directory {
        Directory {
            driver: self.driver.clone(),
            ..Directory::new(&self.directory)
        }
    }

    /// Sibling handle named `name`, sharing this file's driver
    pub fn sibling(&self, name: &str) -> File {
        File {
            driver: self.driver.clone(),
            ..File::new(&path::join(&self.directory, name))
        }
    }

    /// Whole content
    pub async fn read(&self) -> Result<Bytes> {
        self.driver()?.read_range(&self.path(), None, None).await
    }

    /// Inclusive byte range; an omitted bound extends to that end of the object
    pub async fn read_range(&self, from: Option<u64>, to: Option<u64>) -> Result<Bytes> {
        self.driver()?.read_range(&self.path(), from, to).await
    }

    /// Replace the content with `data`, readable by everyone
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<bool> {
        self.write_with(data, Acl::default(), &RequestHeaders::new())
            .await
    }

    /// Replace the content with an explicit ACL and extra request headers
    pub async fn write_with(
        &self,
        data: impl Into<Bytes>,
        acl: Acl,
        headers: &RequestHeaders,
    ) -> Result<bool> {
        self.driver()?
            .write_all(&self.path(), data, acl, headers)
            .await
    }

    /// Size in bytes; 0 when the object cannot be inspected
    pub async fn size(&self) -> Result<u64> {
        Ok(self.driver()?.size(&self.path()).await)
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.driver()?.exists(&self.path()).await)
    }

    pub async fn delete(&self) -> Result<()> {
        self.driver()?.delete(&self.path()).await
    }

    /// Copy into `dest`.
    ///
    /// Local targets are downloaded into directly; anything else is staged
    /// through a temporary local file.
    pub async fn copy_to(&self, dest: &dyn FileNode) -> Result<()> {
        match dest.addressing() {
            Addressing::Local(target) => {
                self.driver()?.download(&self.path(), target).await?;
                Ok(())
            }
            Addressing::Object(_) | Addressing::Remote => stage_copy(self, dest).await,
        }
    }

    /// Replace the content with `source`'s
    pub async fn copy_from(&self, source: &dyn FileNode) -> Result<()> {
        match source.addressing() {
            Addressing::Local(local) => {
                self.driver()?
                    .upload(local, &self.path(), Acl::default(), &RequestHeaders::new())
                    .await
            }
            Addressing::Object(_) | Addressing::Remote => stage_copy(source, self).await,
        }
    }

    /// Move the content to `dest`.
    ///
    /// Between object-store files the content is buffered, written under the
    /// new key, and the old key is deleted only once that write succeeded.
    /// Other targets get a copy followed by a delete. A failed delete after
    /// a successful write leaves both copies in place.
    pub async fn move_to(&self, dest: &dyn FileNode) -> Result<()> {
        match dest.addressing() {
            Addressing::Object(target) => self.rename_onto(target).await,
            _ => {
                self.copy_to(dest).await?;
                self.delete().await
            }
        }
    }

    /// Rename within the same directory; the handle follows the new name
    pub async fn rename(&mut self, new_name: &str) -> Result<()> {
        let target = self.sibling(new_name);
        self.rename_onto(&target).await?;
        self.directory = target.directory;
        self.basename = target.basename;
        Ok(())
    }

    async fn rename_onto(&self, target: &File) -> Result<()> {
        debug!("rename: {} -> {}", self.path(), target.path());
        if self.path() == target.path() && self.driver()?.same_store(target.driver()?) {
            return Ok(());
        }
        let content = self.read().await?;
        target.write(content).await?;
        self.delete().await
    }
}

#[async_trait]
impl FileNode for File {
    fn path(&self) -> String {
        File::path(self)
    }

    fn basename(&self) -> &str {
        &self.basename
    }

    fn addressing(&self) -> Addressing<'_> {
        Addressing::Object(self)
    }

    async fn read(&self) -> Result<Bytes> {
        File::read(self).await
    }

    async fn write(&self, data: Bytes) -> Result<()> {
        File::write(self, data).await.map(|_| ())
    }

    async fn exists(&self) -> Result<bool> {
        File::exists(self).await
    }

    async fn size(&self) -> Result<u64> {
        File::size(self).await
    }

    async fn delete(&self) -> Result<()> {
        File::delete(self).await
    }

    async fn copy_to(&self, dest: &dyn FileNode) -> Result<()> {
        File::copy_to(self, dest).await
    }

    async fn copy_from(&self, source: &dyn FileNode) -> Result<()> {
        File::copy_from(self, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_components() {
        let f = File::new("./docs/guide/intro.md");
        assert_eq!(f.dirname(), "docs/guide");
        assert_eq!(f.basename(), "intro.md");
        assert_eq!(f.path(), "docs/guide/intro.md");
        assert_eq!(f.extension(), Some("md"));

        let top = File::new("/README");
        assert_eq!(top.path(), "README");
        assert_eq!(top.extension(), None);
        assert_eq!(File::new(".env").extension(), None);
    }

    #[test]
    fn test_parent_and_sibling() {
        let f = File::new("a/b/c.txt");
        assert_eq!(f.parent().path(), "a/b");
        assert_eq!(f.sibling("d.txt").path(), "a/b/d.txt");
    }

    #[tokio::test]
    async fn test_unbound_file_reports_unresolved() {
        let f = File::new("a.txt");
        assert!(!f.has_driver());
        let err = f.read().await.unwrap_err();
        assert!(matches!(err, crate::error::BucketFsError::DriverUnresolved(_)));
    }
}
