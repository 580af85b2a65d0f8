//! Directory-tree emulation over a flat object store
//!
//! The store only knows keys. Directories are synthesized here: a directory
//! exists when a zero-length marker object `dir/` exists or when any key
//! lives under the `dir/` prefix. Listings are built from a single prefix
//! request and folded in memory, never by walking the tree level by level.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::{resolve_named, Configuration, ConfigurationProvider};
use crate::connector::{
    Acl, ByteRange, Connector, ConnectorFactory, ListEntry, ListRequest, ObjectInput,
    RequestHeaders,
};
use crate::error::{BucketFsError, Result};
use crate::path::{dir_prefix, normalize};

/// Hierarchy-emulation engine bound to one bucket
pub struct Driver {
    bucket: String,
    configuration: Configuration,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.configuration.endpoint())
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub fn new(
        configuration: Configuration,
        bucket: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            configuration,
            connector,
        }
    }

    /// Open a fresh connection for `configuration`
    pub async fn connect(
        configuration: Configuration,
        bucket: impl Into<String>,
        factory: &dyn ConnectorFactory,
    ) -> Result<Self> {
        let connector = factory.connect(&configuration).await?;
        Ok(Self::new(configuration, bucket, connector))
    }

    /// Driver for a named configuration, or `None` when the provider has no
    /// usable entry under that name
    pub async fn from_named(
        provider: &dyn ConfigurationProvider,
        name: Option<&str>,
        factory: &dyn ConnectorFactory,
    ) -> Result<Option<Self>> {
        match resolve_named(provider, name) {
            Some(named) => Ok(Some(
                Self::connect(named.configuration, named.bucket, factory).await?,
            )),
            None => Ok(None),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// True when both drivers address the same bucket of the same store
    pub fn same_store(&self, other: &Driver) -> bool {
        std::ptr::eq(self, other)
            || (self.bucket == other.bucket
                && (Arc::ptr_eq(&self.connector, &other.connector)
                    || self.connector.store_id() == other.connector.store_id()))
    }

    fn not_found(&self, key: &str) -> BucketFsError {
        BucketFsError::not_found(&self.bucket, key)
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Store the content of a local file at `remote`
    pub async fn upload(
        &self,
        local: &Path,
        remote: &str,
        acl: Acl,
        headers: &RequestHeaders,
    ) -> Result<()> {
        let key = normalize(remote);
        debug!("upload: bucket={} key={} local={:?}", self.bucket, key, local);

        self.connector
            .put_object(ObjectInput::from_file(local), &self.bucket, key, acl, headers)
            .await
            .map_err(|e| {
                debug!("upload failed: {}", e);
                self.not_found(key)
            })
    }

    /// Fetch `remote` into a local file; the file is only replaced once the
    /// whole object has been received
    pub async fn download(&self, remote: &str, local: &Path) -> Result<bool> {
        let key = normalize(remote);
        debug!("download: bucket={} key={} local={:?}", self.bucket, key, local);

        self.connector
            .get_object_to_file(&self.bucket, key, local)
            .await
            .map_err(|e| {
                debug!("download failed: {}", e);
                self.not_found(key)
            })?;
        Ok(true)
    }

    /// Whole object when both bounds are omitted, else the inclusive range
    pub async fn read_range(
        &self,
        remote: &str,
        from: Option<u64>,
        to: Option<u64>,
    ) -> Result<Bytes> {
        let key = normalize(remote);
        let range = match (from, to) {
            (None, None) => None,
            (from, to) => Some(ByteRange::new(from.unwrap_or(0), to)),
        };
        trace!("read: bucket={} key={} range={:?}", self.bucket, key, range);

        self.connector
            .get_object(&self.bucket, key, range)
            .await
            .map_err(|e| {
                debug!("read failed: {}", e);
                self.not_found(key)
            })
    }

    /// Replace the whole content of `remote`
    pub async fn write_all(
        &self,
        remote: &str,
        data: impl Into<Bytes>,
        acl: Acl,
        headers: &RequestHeaders,
    ) -> Result<bool> {
        let key = normalize(remote);
        let data = data.into();
        debug!("write: bucket={} key={} size={}", self.bucket, key, data.len());

        self.connector
            .put_object(ObjectInput::Data(data), &self.bucket, key, acl, headers)
            .await
            .map_err(|e| {
                debug!("write failed: {}", e);
                self.not_found(key)
            })?;
        Ok(true)
    }

    /// Create the marker object `remote/`.
    ///
    /// The bucket root always exists and needs no marker.
    pub async fn make_directory(&self, remote: &str) -> bool {
        let key = dir_prefix(remote);
        if key.is_empty() {
            return true;
        }
        debug!("mkdir: bucket={} key={}", self.bucket, key);

        match self
            .connector
            .put_object(
                ObjectInput::DirectoryMarker,
                &self.bucket,
                &key,
                Acl::PublicReadWrite,
                &RequestHeaders::new(),
            )
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("mkdir failed: {}", e);
                false
            }
        }
    }

    /// Remove a single key
    pub async fn delete(&self, remote: &str) -> Result<()> {
        let key = normalize(remote);
        debug!("delete: bucket={} key={}", self.bucket, key);

        self.connector
            .delete_object(&self.bucket, key)
            .await
            .map_err(|e| {
                debug!("delete failed: {}", e);
                self.not_found(key)
            })
    }

    /// Object size; 0 when the object cannot be inspected
    pub async fn size(&self, remote: &str) -> u64 {
        let key = normalize(remote);
        match self.connector.head_object(&self.bucket, key).await {
            Ok(head) => head.size.unwrap_or(0),
            Err(e) => {
                trace!("size probe failed: {}", e);
                0
            }
        }
    }

    /// True iff a head request succeeds and reports a size
    pub async fn exists(&self, remote: &str) -> bool {
        let key = normalize(remote);
        match self.connector.head_object(&self.bucket, key).await {
            Ok(head) => head.size.is_some(),
            Err(e) => {
                trace!("exists probe failed: {}", e);
                false
            }
        }
    }

    // =========================================================================
    // Directories
    // =========================================================================

    /// Remove the marker object only; contents are left in place
    pub async fn directory_delete(&self, remote: &str) -> bool {
        let key = dir_prefix(remote);
        if key.is_empty() {
            return false;
        }
        debug!("rmdir: bucket={} key={}", self.bucket, key);

        match self.connector.delete_object(&self.bucket, &key).await {
            Ok(()) => true,
            Err(e) => {
                warn!("rmdir failed: {}", e);
                false
            }
        }
    }

    /// Sum of the sizes of every file below `remote`
    pub async fn directory_size(&self, remote: &str) -> Result<u64> {
        Ok(self
            .directory_files(remote, true)
            .await?
            .iter()
            .map(|entry| entry.size().unwrap_or(0))
            .sum())
    }

    /// A directory exists when its marker exists or anything lives under it
    pub async fn directory_exists(&self, remote: &str) -> bool {
        let prefix = dir_prefix(remote);
        if prefix.is_empty() {
            return true;
        }

        let request = ListRequest {
            max_keys: Some(1),
            ..ListRequest::shallow(&prefix)
        };
        match self.connector.list_objects(&self.bucket, &request).await {
            Ok(entries) => entries.iter().any(|entry| entry.key().starts_with(&prefix)),
            Err(e) => {
                warn!("directory exists probe failed: {}", e);
                false
            }
        }
    }

    /// Every directory below `remote`, as `path/` strings.
    ///
    /// Built from one recursive listing: each key contributes all of its
    /// ancestors between `remote` and the key's last segment. With
    /// `recursive == false` only the immediate subdirectories are kept.
    pub async fn directory_directories(&self, remote: &str, recursive: bool) -> Result<Vec<String>> {
        let base = dir_prefix(remote);
        let entries = self.directory_items(remote, true).await?;

        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for entry in &entries {
            let Some(rest) = entry.key().strip_prefix(base.as_str()) else {
                continue;
            };
            let segments: Vec<&str> = rest.split('/').collect();
            // The last segment is a file name or the empty tail of a marker
            let depth = segments.len().saturating_sub(1);
            let depth = if recursive { depth } else { depth.min(1) };

            let mut path = base.clone();
            for segment in &segments[..depth] {
                path.push_str(segment);
                path.push('/');
                if seen.insert(path.clone()) {
                    result.push(path.clone());
                }
            }
        }

        Ok(result)
    }

    /// Listing entries that are files
    pub async fn directory_files(&self, remote: &str, recursive: bool) -> Result<Vec<ListEntry>> {
        Ok(self
            .directory_items(remote, recursive)
            .await?
            .into_iter()
            .filter(ListEntry::is_file)
            .collect())
    }

    /// The listing primitive.
    ///
    /// Flat listings group deeper keys into common prefixes with the `/`
    /// delimiter; recursive listings return every key under the prefix.
    /// The directory's own marker is not part of its contents.
    pub async fn directory_items(&self, remote: &str, recursive: bool) -> Result<Vec<ListEntry>> {
        let prefix = dir_prefix(remote);
        let request = if recursive {
            ListRequest::recursive(&prefix)
        } else {
            ListRequest::shallow(&prefix)
        };
        trace!(
            "list: bucket={} prefix={} recursive={}",
            self.bucket,
            prefix,
            recursive
        );

        let entries = self
            .connector
            .list_objects(&self.bucket, &request)
            .await
            .map_err(|e| {
                debug!("list failed: {}", e);
                self.not_found(prefix.as_str())
            })?;

        Ok(entries
            .into_iter()
            .filter(|entry| prefix.is_empty() || entry.key() != prefix)
            .collect())
    }
}
