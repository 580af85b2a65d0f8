//! Object-store directory handle
//!
//! A directory is only a key prefix. Its marker object makes an empty
//! directory visible; everything else is derived from listings.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::connector::EntryKind;
use crate::error::{BucketFsError, Result};
use crate::node::{DirectoryNode, DriverSlot, File, FileNode, Node};
use crate::path;

/// A directory emulated over a key prefix
#[derive(Debug, Clone)]
pub struct Directory {
    pub(crate) directory: String,
    pub(crate) basename: String,
    pub(crate) driver: DriverSlot,
}

super::driver_bound_handle!(Directory);

impl Directory {
    /// Handle for `path`, not bound to a driver yet; `""` and `"/"` name the
    /// bucket root
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

    pub fn dirname(&self) -> &str {
        &self.directory
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn is_root(&self) -> bool {
        self.path().is_empty()
    }

    /// File handle below this directory, sharing its driver
    pub fn file(&self, name: &str) -> File {
        File {
            driver: self.driver.clone(),
            ..File::new(&path::join(&self.path(), name))
        }
    }

    /// Directory handle below this directory, sharing its driver
    pub fn directory(&self, name: &str) -> Directory {
        Directory {
            driver: self.driver.clone(),
            ..Directory::new(&path::join(&self.path(), name))
        }
    }

    /// Handle of the containing directory
    pub fn parent(&self) -> Directory {
        Directory {
            driver: self.driver.clone(),
            ..Directory::new(&self.directory)
        }
    }

    /// Total size of every file below this directory
    pub async fn size(&self) -> Result<u64> {
        self.driver()?.directory_size(&self.path()).await
    }

    pub async fn exists(&self) -> Result<bool> {
        Ok(self.driver()?.directory_exists(&self.path()).await)
    }

    /// Write the directory marker
    pub async fn make(&self) -> Result<bool> {
        Ok(self.driver()?.make_directory(&self.path()).await)
    }

    /// Remove the directory marker only; contents stay where they are
    pub async fn delete(&self) -> Result<bool> {
        Ok(self.driver()?.directory_delete(&self.path()).await)
    }

    /// Remove every file and marker below this directory, then its own marker
    pub async fn delete_recursive(&self) -> Result<()> {
        let driver = self.driver()?;
        let base = self.path();
        debug!("delete_recursive: {}", base);

        for entry in driver.directory_files(&base, true).await? {
            driver.delete(entry.key()).await?;
        }

        let mut directories = driver.directory_directories(&base, true).await?;
        // Deepest first, so no marker outlives its parent's
        directories.sort_by_key(|d| std::cmp::Reverse(d.matches('/').count()));
        for directory in directories {
            driver.directory_delete(&directory).await;
        }

        if !self.is_root() {
            driver.directory_delete(&base).await;
        }
        Ok(())
    }

    /// Files below this directory
    pub async fn files(&self, recursive: bool) -> Result<Vec<File>> {
        let entries = self
            .driver()?
            .directory_files(&self.path(), recursive)
            .await?;

        Ok(entries
            .iter()
            .map(|entry| File {
                driver: self.driver.clone(),
                ..File::new(entry.key())
            })
            .collect())
    }

    /// Subdirectories; with `recursive` every level below this one
    pub async fn directories(&self, recursive: bool) -> Result<Vec<Directory>> {
        let paths = self
            .driver()?
            .directory_directories(&self.path(), recursive)
            .await?;

        Ok(paths
            .iter()
            .map(|path| Directory {
                driver: self.driver.clone(),
                ..Directory::new(path)
            })
            .collect())
    }

    /// Files and directories, as listed by the store
    pub async fn items(&self, recursive: bool) -> Result<Vec<Node>> {
        let entries = self
            .driver()?
            .directory_items(&self.path(), recursive)
            .await?;

        Ok(entries
            .iter()
            .map(|entry| match entry.kind() {
                EntryKind::File => Node::File(File {
                    driver: self.driver.clone(),
                    ..File::new(entry.key())
                }),
                EntryKind::Directory => Node::Directory(Directory {
                    driver: self.driver.clone(),
                    ..Directory::new(entry.key())
                }),
            })
            .collect())
    }

    /// Path of `node_path` relative to this directory
    fn relative<'a>(&self, node_path: &'a str) -> &'a str {
        let base = path::dir_prefix(&self.path());
        node_path.strip_prefix(base.as_str()).unwrap_or(node_path)
    }

    /// True when `other` is this directory or lies below it in the same store
    fn contains(&self, other: &Directory) -> Result<bool> {
        if !self.driver()?.same_store(other.driver()?) {
            return Ok(false);
        }
        let base = path::dir_prefix(&self.path());
        Ok(path::dir_prefix(&other.path()).starts_with(base.as_str()))
    }

    /// Recreate this tree under `dest`, file by file.
    ///
    /// A destination inside this tree is rejected before anything is written.
    pub async fn copy_to(&self, dest: &dyn DirectoryNode) -> Result<()> {
        if let Some(target) = dest.as_object() {
            if self.contains(target)? {
                return Err(BucketFsError::TargetInsideSource {
                    from: self.path(),
                    to: target.path(),
                });
            }
        }
        info!("copy directory {} -> {}", self.path(), dest.path());
        if !dest.make().await? {
            return Err(BucketFsError::CannotCreate(dest.path()));
        }

        for directory in self.directories(true).await? {
            let path = directory.path();
            let child = dest.child_directory(self.relative(&path));
            if !child.make().await? {
                return Err(BucketFsError::CannotCreate(child.path()));
            }
        }

        for file in self.files(true).await? {
            let path = file.path();
            let target = dest.child_file(self.relative(&path));
            file.copy_to(target.as_ref()).await?;
        }
        Ok(())
    }

    /// Copy to `dest`, then remove this tree. Nothing is removed unless the
    /// copy completed.
    pub async fn move_to(&self, dest: &dyn DirectoryNode) -> Result<()> {
        self.copy_to(dest).await?;
        self.delete_recursive().await
    }

    /// Move to a sibling named `new_name`; the handle follows the new name
    pub async fn rename(&mut self, new_name: &str) -> Result<()> {
        let target = self.parent().directory(new_name);
        if target.path() == self.path() {
            return Ok(());
        }
        self.move_to(&target).await?;
        self.directory = target.directory;
        self.basename = target.basename;
        Ok(())
    }
}

#[async_trait]
impl DirectoryNode for Directory {
    fn path(&self) -> String {
        Directory::path(self)
    }

    async fn exists(&self) -> Result<bool> {
        Directory::exists(self).await
    }

    async fn make(&self) -> Result<bool> {
        Directory::make(self).await
    }

    fn child_file(&self, relative: &str) -> Box<dyn FileNode> {
        Box::new(self.file(relative))
    }

    fn child_directory(&self, relative: &str) -> Box<dyn DirectoryNode> {
        Box::new(self.directory(relative))
    }

    fn as_object(&self) -> Option<&Directory> {
        Some(self)
    }
}
