//! Storage mounts
//!
//! A storage is a root directory in one bucket plus an access policy. Public
//! storages can hand out direct URLs for their nodes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::config::{strict_bool, string_field, Config, Configuration};
use crate::connector::ConnectorFactory;
use crate::driver::Driver;
use crate::error::{BucketFsError, Result};
use crate::node::{BucketNode, Directory, File};
use crate::path;

/// Access policy of a storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Public,
    Protected,
    Private,
}

impl FromStr for StorageType {
    type Err = BucketFsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "public" => Ok(StorageType::Public),
            "protected" => Ok(StorageType::Protected),
            "private" => Ok(StorageType::Private),
            other => Err(BucketFsError::invalid_config(
                "type",
                format!("unknown storage type '{}'", other),
            )),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StorageType::Public => "public",
            StorageType::Protected => "protected",
            StorageType::Private => "private",
        })
    }
}

/// A mounted directory tree in one bucket
#[derive(Debug, Clone)]
pub struct Storage {
    kind: StorageType,
    root: Directory,
    configuration: Configuration,
    bucket: String,
    read_only: bool,
}

impl Storage {
    /// Mount `root`, creating its marker when the storage is writable and the
    /// directory does not exist yet
    pub async fn new(
        kind: StorageType,
        root: Directory,
        configuration: Configuration,
        bucket: impl Into<String>,
        read_only: bool,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if !read_only && !root.exists().await? {
            info!("creating storage root [{}]:{}", bucket, root.path());
            if !root.make().await? {
                warn!("cannot create storage root [{}]:{}", bucket, root.path());
            }
        }
        Ok(Self {
            kind,
            root,
            configuration,
            bucket,
            read_only,
        })
    }

    /// Build a storage from a definition map.
    ///
    /// `type`, `key`, `secret` and `bucket` are required strings; `endpoint`,
    /// `region`, `signature` and `root` must be strings when present.
    pub async fn from_options(options: &Mapping, factory: &dyn ConnectorFactory) -> Result<Self> {
        for field in ["type", "key", "secret", "bucket"] {
            match options.get(field) {
                None | Some(Value::Null) => {
                    return Err(BucketFsError::invalid_config(field, "index is not present"))
                }
                Some(Value::String(_)) => {}
                Some(_) => return Err(BucketFsError::invalid_config(field, "value is not string")),
            }
        }
        for field in ["endpoint", "region", "signature", "root"] {
            match options.get(field) {
                None | Some(Value::Null) | Some(Value::String(_)) => {}
                Some(_) => return Err(BucketFsError::invalid_config(field, "value is not string")),
            }
        }

        let field = |name: &str| string_field(options, name).unwrap_or_default();
        let kind: StorageType = field("type").parse()?;
        let bucket = field("bucket").to_string();

        let mut configuration = Configuration::new(field("key"), field("secret"))
            .with_region(string_field(options, "region").map(str::to_string))
            .with_endpoint(string_field(options, "endpoint").map(str::to_string));
        if let Some(signature) = string_field(options, "signature") {
            configuration = configuration.with_signature(signature.parse()?);
        }
        if let Some(value) = options.get("use_ssl") {
            configuration = configuration.with_ssl(strict_bool(value));
        }
        if let Some(value) = options.get("legacy_style_path") {
            configuration = configuration.with_legacy_path_style(strict_bool(value));
        }
        let read_only = options.get("read_only").map(strict_bool).unwrap_or(false);

        let driver = Arc::new(Driver::connect(configuration.clone(), bucket.clone(), factory).await?);
        let root = Directory::new(string_field(options, "root").unwrap_or("/")).with_driver(driver);
        debug!("storage {} on [{}]:{}", kind, bucket, root.path());

        Self::new(kind, root, configuration, bucket, read_only).await
    }

    /// Storage named `name` in the config file
    pub async fn from_config(
        config: &Config,
        name: &str,
        factory: &dyn ConnectorFactory,
    ) -> Result<Self> {
        let options = config.storage(name).ok_or_else(|| {
            BucketFsError::invalid_config(format!("storages.{}", name), "index is not present")
        })?;
        Self::from_options(options, factory).await
    }

    pub fn kind(&self) -> StorageType {
        self.kind
    }

    pub fn root(&self) -> &Directory {
        &self.root
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True when `node` lies below the root, in the same bucket
    fn holds(&self, node: &dyn BucketNode) -> Result<bool> {
        if let Some(driver) = node.bound_driver() {
            if !self.root.driver()?.same_store(driver) {
                return Ok(false);
            }
        }
        let root = path::dir_prefix(&self.root.path());
        Ok(path::dir_prefix(&node.bucket_path()).starts_with(root.as_str()))
    }

    /// File handle at `path` below the root
    pub fn file(&self, path: &str) -> File {
        self.root.file(path)
    }

    /// Directory handle at `path` below the root
    pub fn directory(&self, path: &str) -> Directory {
        self.root.directory(path)
    }

    /// Direct URL of `node`. Only public storages have one, and only for
    /// nodes below the root in the storage's own bucket.
    pub fn url(&self, node: &dyn BucketNode) -> Result<String> {
        let node_path = node.bucket_path();
        if self.kind != StorageType::Public || !self.holds(node)? {
            return Err(BucketFsError::AccessForbidden(node_path));
        }

        let legacy = self.configuration.use_legacy_path_style();
        let scheme = if self.configuration.is_ssl() { "https" } else { "http" };
        let endpoint = self.configuration.endpoint();
        let endpoint = endpoint
            .split_once("://")
            .map(|(_, host)| host)
            .unwrap_or(endpoint)
            .trim_end_matches('/');
        let key = path::normalize(&node_path);

        Ok(if legacy {
            format!("{}://{}/{}/{}", scheme, endpoint, self.bucket, key)
        } else {
            format!("{}://{}.{}/{}", scheme, self.bucket, endpoint, key)
        })
    }
}
