//! File and directory handles
//!
//! Handles are path values bound to a shared [`Driver`]. Object-store
//! handles ([`File`], [`Directory`]) and local-disk handles ([`LocalFile`],
//! [`LocalDirectory`]) implement the same node capability set, so content
//! can be copied or moved between them.

pub mod directory;
pub mod file;
pub mod local;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::{Configuration, ConfigurationProvider};
use crate::connector::ConnectorFactory;
use crate::driver::Driver;
use crate::error::{BucketFsError, Result};

pub use directory::Directory;
pub use file::File;
pub use local::{LocalDirectory, LocalFile};

/// How a file node's content can be reached
pub enum Addressing<'a> {
    /// Backed by a path on the local disk
    Local(&'a Path),
    /// An object-store file handled by this crate
    Object(&'a File),
    /// Any other remote backend
    Remote,
}

/// Capability set shared by every file backend
#[async_trait]
pub trait FileNode: Send + Sync {
    /// Full path of the node
    fn path(&self) -> String;

    fn basename(&self) -> &str;

    fn addressing(&self) -> Addressing<'_>;

    async fn read(&self) -> Result<Bytes>;

    async fn write(&self, data: Bytes) -> Result<()>;

    async fn exists(&self) -> Result<bool>;

    async fn size(&self) -> Result<u64>;

    async fn delete(&self) -> Result<()>;

    /// Copy this node's content into `dest`
    async fn copy_to(&self, dest: &dyn FileNode) -> Result<()>;

    /// Replace this node's content with `source`'s
    async fn copy_from(&self, source: &dyn FileNode) -> Result<()>;
}

/// Capability set shared by every directory backend
#[async_trait]
pub trait DirectoryNode: Send + Sync {
    fn path(&self) -> String;

    async fn exists(&self) -> Result<bool>;

    /// Create the directory; `false` when the backend refused
    async fn make(&self) -> Result<bool>;

    /// File handle at `relative` below this directory
    fn child_file(&self, relative: &str) -> Box<dyn FileNode>;

    /// Directory handle at `relative` below this directory
    fn child_directory(&self, relative: &str) -> Box<dyn DirectoryNode>;

    /// The object-store handle behind this node, if it is one
    fn as_object(&self) -> Option<&Directory> {
        None
    }
}

/// Copy between two file nodes through a temporary local file.
///
/// Used whenever neither side is local, so the two backends never need to
/// know about each other.
pub async fn stage_copy(source: &dyn FileNode, dest: &dyn FileNode) -> Result<()> {
    let staging = tempfile::NamedTempFile::new()?.into_temp_path();
    let local = LocalFile::new(staging.to_path_buf());
    tracing::trace!("staging {} -> {} via {:?}", source.path(), dest.path(), staging);

    source.copy_to(&local).await?;
    dest.copy_from(&local).await?;
    Ok(())
}

/// An object-store handle: a key path plus the driver it is bound to
pub trait BucketNode {
    /// Bucket-relative path of the node
    fn bucket_path(&self) -> String;

    fn bound_driver(&self) -> Option<&Arc<Driver>>;
}

/// One item of a directory listing
#[derive(Debug, Clone)]
pub enum Node {
    File(File),
    Directory(Directory),
}

impl Node {
    pub fn path(&self) -> String {
        match self {
            Node::File(f) => f.path(),
            Node::Directory(d) => d.path(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }
}

impl BucketNode for Node {
    fn bucket_path(&self) -> String {
        self.path()
    }

    fn bound_driver(&self) -> Option<&Arc<Driver>> {
        match self {
            Node::File(f) => f.bound_driver(),
            Node::Directory(d) => d.bound_driver(),
        }
    }
}

// =============================================================================
// Driver binding
// =============================================================================

/// Reconnection parameters of a driver: everything but the live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverState {
    pub bucket: String,
    pub configuration: Configuration,
}

impl DriverState {
    fn of(driver: &Driver) -> Self {
        Self {
            bucket: driver.bucket().to_string(),
            configuration: driver.configuration().clone(),
        }
    }
}

/// Persisted form of a handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    #[serde(default)]
    pub directory: String,
    #[serde(default)]
    pub basename: String,
    #[serde(default)]
    pub driver: Option<DriverState>,
}

/// The driver a handle is bound to
#[derive(Debug, Clone, Default)]
pub(crate) enum DriverSlot {
    #[default]
    Unresolved,
    /// Restored from a persisted handle, not connected yet
    Detached(DriverState),
    Attached(Arc<Driver>),
}

impl DriverSlot {
    pub(crate) fn get(&self, path: &str) -> Result<&Arc<Driver>> {
        match self {
            DriverSlot::Attached(driver) => Ok(driver),
            _ => Err(BucketFsError::DriverUnresolved(path.to_string())),
        }
    }

    pub(crate) fn state(&self) -> Option<DriverState> {
        match self {
            DriverSlot::Unresolved => None,
            DriverSlot::Detached(state) => Some(state.clone()),
            DriverSlot::Attached(driver) => Some(DriverState::of(driver)),
        }
    }

    /// Connect a detached slot with `factory`
    pub(crate) async fn reattach(
        &mut self,
        path: &str,
        factory: &dyn ConnectorFactory,
    ) -> Result<Arc<Driver>> {
        match self {
            DriverSlot::Attached(driver) => Ok(driver.clone()),
            DriverSlot::Detached(state) => {
                let driver = Arc::new(
                    Driver::connect(state.configuration.clone(), state.bucket.clone(), factory)
                        .await?,
                );
                tracing::debug!("reattached {} to bucket {}", path, driver.bucket());
                *self = DriverSlot::Attached(driver.clone());
                Ok(driver)
            }
            DriverSlot::Unresolved => Err(BucketFsError::DriverUnresolved(path.to_string())),
        }
    }

    /// Bind an unresolved slot to the named configuration of `provider`
    pub(crate) async fn resolve(
        &mut self,
        path: &str,
        provider: &dyn ConfigurationProvider,
        name: Option<&str>,
        factory: &dyn ConnectorFactory,
    ) -> Result<Arc<Driver>> {
        if !matches!(self, DriverSlot::Unresolved) {
            return self.reattach(path, factory).await;
        }
        match Driver::from_named(provider, name, factory).await? {
            Some(driver) => {
                let driver = Arc::new(driver);
                *self = DriverSlot::Attached(driver.clone());
                Ok(driver)
            }
            None => Err(BucketFsError::DriverUnresolved(path.to_string())),
        }
    }
}

/// Implements binding, persistence and serde for a handle type with
/// `directory`, `basename` and `driver: DriverSlot` fields.
macro_rules! driver_bound_handle {
    ($ty:ty) => {
        impl $ty {
            /// Share `driver` with this handle
            pub fn set_driver(&mut self, driver: std::sync::Arc<$crate::driver::Driver>) {
                self.driver = $crate::node::DriverSlot::Attached(driver);
            }

            pub fn with_driver(mut self, driver: std::sync::Arc<$crate::driver::Driver>) -> Self {
                self.set_driver(driver);
                self
            }

            /// The bound driver, or `DriverUnresolved`
            pub fn driver(&self) -> $crate::error::Result<&std::sync::Arc<$crate::driver::Driver>> {
                self.driver.get(&self.path())
            }

            pub fn has_driver(&self) -> bool {
                matches!(self.driver, $crate::node::DriverSlot::Attached(_))
            }

            /// Open a fresh connection for a handle restored from its persisted form
            pub async fn reattach(
                &mut self,
                factory: &dyn $crate::connector::ConnectorFactory,
            ) -> $crate::error::Result<std::sync::Arc<$crate::driver::Driver>> {
                let path = self.path();
                self.driver.reattach(&path, factory).await
            }

            /// Bind the handle to a named configuration when it has no driver yet.
            ///
            /// The result is cached on the handle; later calls reuse it.
            pub async fn resolve_default_driver(
                &mut self,
                provider: &dyn $crate::config::ConfigurationProvider,
                name: Option<&str>,
                factory: &dyn $crate::connector::ConnectorFactory,
            ) -> $crate::error::Result<std::sync::Arc<$crate::driver::Driver>> {
                let path = self.path();
                self.driver.resolve(&path, provider, name, factory).await
            }

            /// Persisted form; the live connection is never part of it
            pub fn state(&self) -> $crate::node::NodeState {
                $crate::node::NodeState {
                    directory: self.directory.clone(),
                    basename: self.basename.clone(),
                    driver: self.driver.state(),
                }
            }

            /// Restore a handle; it must be reattached before use
            pub fn from_state(state: $crate::node::NodeState) -> Self {
                Self {
                    directory: state.directory,
                    basename: state.basename,
                    driver: match state.driver {
                        Some(driver) => $crate::node::DriverSlot::Detached(driver),
                        None => $crate::node::DriverSlot::Unresolved,
                    },
                }
            }
        }

        impl $crate::node::BucketNode for $ty {
            fn bucket_path(&self) -> String {
                self.path()
            }

            fn bound_driver(&self) -> Option<&std::sync::Arc<$crate::driver::Driver>> {
                self.driver().ok()
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                let state = self.state();
                if state.driver.is_none() {
                    return Err(serde::ser::Error::custom(format!(
                        "no driver bound to {}",
                        self.path()
                    )));
                }
                serde::Serialize::serialize(&state, serializer)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                <$crate::node::NodeState as serde::Deserialize>::deserialize(deserializer)
                    .map(Self::from_state)
            }
        }
    };
}

pub(crate) use driver_bound_handle;
