pub mod memory;
pub mod s3;

use std::collections::HashMap;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::Configuration;
use crate::error::Result;

/// Canned access-control policy applied to a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Acl {
    Private,
    #[default]
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

impl Acl {
    /// Wire name of the canned ACL
    pub fn as_str(&self) -> &'static str {
        match self {
            Acl::Private => "private",
            Acl::PublicRead => "public-read",
            Acl::PublicReadWrite => "public-read-write",
            Acl::AuthenticatedRead => "authenticated-read",
        }
    }
}

/// Extra request headers sent along with a put
pub type RequestHeaders = HashMap<String, String>;

/// Body of a put request
#[derive(Debug, Clone)]
pub enum ObjectInput {
    /// In-memory content
    Data(Bytes),
    /// Content streamed from a local file
    File(PathBuf),
    /// Zero-length directory marker
    DirectoryMarker,
}

impl ObjectInput {
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        ObjectInput::Data(data.into())
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        ObjectInput::File(path.into())
    }
}

/// Inclusive byte range for partial reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    /// Last byte to return; `None` reads to the end
    pub to: Option<u64>,
}

impl ByteRange {
    pub fn new(from: u64, to: Option<u64>) -> Self {
        Self { from, to }
    }

    /// HTTP `Range` header value
    pub fn header(&self) -> String {
        match self.to {
            Some(to) => format!("bytes={}-{}", self.from, to),
            None => format!("bytes={}-", self.from),
        }
    }
}

/// Result of a head request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObjectHead {
    pub size: Option<u64>,
}

/// Whether a listing entry denotes a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One item of a prefix listing.
///
/// The kind is fixed when the entry is parsed from the store's response:
/// keys ending in `/` and common prefixes are directories, every other key
/// is a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    key: String,
    size: Option<u64>,
    common_prefix: bool,
    kind: EntryKind,
}

impl ListEntry {
    /// A real object key
    pub fn object(key: impl Into<String>, size: Option<u64>) -> Self {
        let key = key.into();
        let kind = if key.ends_with('/') {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        Self {
            key,
            size,
            common_prefix: false,
            kind,
        }
    }

    /// A common-prefix group synthesized from the delimiter
    pub fn common_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key: prefix.into(),
            size: None,
            common_prefix: true,
            kind: EntryKind::Directory,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_common_prefix(&self) -> bool {
        self.common_prefix
    }
}

/// Parameters of a prefix listing
#[derive(Debug, Clone, Default)]
pub struct ListRequest<'a> {
    pub prefix: &'a str,
    /// Only keys strictly after this one are returned
    pub marker: Option<&'a str>,
    pub max_keys: Option<i32>,
    /// Empty means no grouping: every key under the prefix is returned
    pub delimiter: &'a str,
    pub common_prefixes: bool,
}

impl<'a> ListRequest<'a> {
    /// One level below `prefix`, grouping deeper keys into common prefixes
    pub fn shallow(prefix: &'a str) -> Self {
        Self {
            prefix,
            delimiter: "/",
            common_prefixes: true,
            ..Default::default()
        }
    }

    /// Every key under `prefix`
    pub fn recursive(prefix: &'a str) -> Self {
        Self {
            prefix,
            delimiter: "",
            common_prefixes: true,
            ..Default::default()
        }
    }
}

/// Typed failures raised by a connector
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("Cannot put [{bucket}]:{key}: {message}")]
    CannotPutFile {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Cannot get [{bucket}]:{key}: {message}")]
    CannotGetFile {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Cannot delete [{bucket}]:{key}: {message}")]
    CannotDeleteFile {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Cannot list [{bucket}]:{prefix}: {message}")]
    CannotGetBucket {
        bucket: String,
        prefix: String,
        message: String,
    },
}

pub type ConnectorResult<T> = std::result::Result<T, ConnectorError>;

/// Object-store capability consumed by the driver.
///
/// Every call is a single request against the store; retries, signing and
/// transport live behind this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Identity of the backing store. Two connectors with the same id see
    /// the same buckets.
    fn store_id(&self) -> String;

    /// Store `input` at `key`
    async fn put_object(
        &self,
        input: ObjectInput,
        bucket: &str,
        key: &str,
        acl: Acl,
        headers: &RequestHeaders,
    ) -> ConnectorResult<()>;

    /// Fetch an object, or a byte range of it
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ConnectorResult<Bytes>;

    /// Fetch an object into a local file.
    ///
    /// The target is replaced only once the whole body is available; on
    /// failure it is left untouched.
    async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        target: &Path,
    ) -> ConnectorResult<()> {
        let data = self.get_object(bucket, key, None).await?;
        replace_file(target, &data).map_err(|e| ConnectorError::CannotGetFile {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: format!("writing {:?}: {}", target, e),
        })
    }

    /// Remove a single key
    async fn delete_object(&self, bucket: &str, key: &str) -> ConnectorResult<()>;

    /// Object metadata without the body
    async fn head_object(&self, bucket: &str, key: &str) -> ConnectorResult<ObjectHead>;

    /// List keys under a prefix
    async fn list_objects(
        &self,
        bucket: &str,
        request: &ListRequest<'_>,
    ) -> ConnectorResult<Vec<ListEntry>>;
}

/// Builds live connectors from persisted connection parameters
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn connect(&self, configuration: &Configuration) -> Result<Arc<dyn Connector>>;
}

/// Write `data` next to `target` and rename it into place
pub(crate) fn replace_file(target: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
