//! In-process object store
//!
//! Behaves like a prefix-addressed bucket store: flat keys, delimiter
//! grouping, ranged reads. Connections handed out by the factory share the
//! same store, so data outlives any single connector handle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::trace;

use crate::config::Configuration;
use crate::connector::{
    Acl, ByteRange, Connector, ConnectorError, ConnectorFactory, ConnectorResult, ListEntry,
    ListRequest, ObjectHead, ObjectInput, RequestHeaders,
};
use crate::error::Result;

/// A stored object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub acl: Acl,
    pub headers: RequestHeaders,
}

#[derive(Default)]
struct Store {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    /// Key prefixes whose puts are rejected
    failing_puts: Vec<String>,
}

/// In-memory connector
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    store: Arc<RwLock<Store>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector with `bucket` already created
    pub fn with_bucket(bucket: &str) -> Self {
        let connector = Self::new();
        connector.create_bucket(bucket);
        connector
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.store
            .write()
            .buckets
            .entry(bucket.to_string())
            .or_default();
    }

    /// Reject every subsequent put whose key starts with `prefix`
    pub fn fail_puts_under(&self, prefix: &str) {
        self.store.write().failing_puts.push(prefix.to_string());
    }

    /// Accept puts again
    pub fn clear_failures(&self) {
        self.store.write().failing_puts.clear();
    }

    /// All keys of a bucket, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.store
            .read()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Direct access to a stored object
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.store
            .read()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }
}

fn slice_range(data: &Bytes, range: ByteRange) -> Option<Bytes> {
    let len = data.len() as u64;
    if range.from > len {
        return None;
    }
    let end = match range.to {
        Some(to) if to < range.from => return None,
        Some(to) => to.saturating_add(1).min(len),
        None => len,
    };
    Some(data.slice(range.from as usize..end as usize))
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn store_id(&self) -> String {
        format!("memory:{:p}", Arc::as_ptr(&self.store))
    }

    async fn put_object(
        &self,
        input: ObjectInput,
        bucket: &str,
        key: &str,
        acl: Acl,
        headers: &RequestHeaders,
    ) -> ConnectorResult<()> {
        trace!("memory put: bucket={} key={}", bucket, key);
        let cannot_put = |message: String| ConnectorError::CannotPutFile {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let data = match input {
            ObjectInput::Data(data) => data,
            ObjectInput::DirectoryMarker => Bytes::new(),
            ObjectInput::File(path) => tokio::fs::read(&path)
                .await
                .map(Bytes::from)
                .map_err(|e| cannot_put(format!("reading {:?}: {}", path, e)))?,
        };

        if key.is_empty() {
            return Err(cannot_put("empty key".to_string()));
        }

        let mut store = self.store.write();
        if store.failing_puts.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(cannot_put("rejected by store".to_string()));
        }
        let objects = store
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| cannot_put("no such bucket".to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                acl,
                headers: headers.clone(),
            },
        );
        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ConnectorResult<Bytes> {
        trace!("memory get: bucket={} key={} range={:?}", bucket, key, range);
        let cannot_get = |message: &str| ConnectorError::CannotGetFile {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        };

        let store = self.store.read();
        let object = store
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| cannot_get("no such key"))?;

        match range {
            None => Ok(object.data.clone()),
            Some(range) => slice_range(&object.data, range).ok_or_else(|| cannot_get("invalid range")),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ConnectorResult<()> {
        trace!("memory delete: bucket={} key={}", bucket, key);
        let mut store = self.store.write();
        let objects = store
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| ConnectorError::CannotDeleteFile {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "no such bucket".to_string(),
            })?;
        // Deleting an absent key succeeds, as it does against S3
        objects.remove(key);
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ConnectorResult<ObjectHead> {
        let store = self.store.read();
        store
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| ObjectHead {
                size: Some(object.data.len() as u64),
            })
            .ok_or_else(|| ConnectorError::CannotGetFile {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "no such key".to_string(),
            })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        request: &ListRequest<'_>,
    ) -> ConnectorResult<Vec<ListEntry>> {
        trace!(
            "memory list: bucket={} prefix={} delimiter={:?}",
            bucket,
            request.prefix,
            request.delimiter
        );
        let store = self.store.read();
        let objects = store
            .buckets
            .get(bucket)
            .ok_or_else(|| ConnectorError::CannotGetBucket {
                bucket: bucket.to_string(),
                prefix: request.prefix.to_string(),
                message: "no such bucket".to_string(),
            })?;

        let mut entries = Vec::new();
        let mut seen_prefixes = BTreeSet::new();
        let limit = request.max_keys.map(|m| m.max(0) as usize);

        for (key, object) in objects.range(request.prefix.to_string()..) {
            if !key.starts_with(request.prefix) {
                break;
            }
            if let Some(marker) = request.marker {
                if key.as_str() <= marker {
                    continue;
                }
            }
            if limit.is_some_and(|limit| entries.len() >= limit) {
                break;
            }

            let rest = &key[request.prefix.len()..];
            if !request.delimiter.is_empty() {
                if let Some(idx) = rest.find(request.delimiter) {
                    let group = &key[..request.prefix.len() + idx + request.delimiter.len()];
                    if request.common_prefixes && seen_prefixes.insert(group.to_string()) {
                        entries.push(ListEntry::common_prefix(group));
                    }
                    continue;
                }
            }

            entries.push(ListEntry::object(key.clone(), Some(object.data.len() as u64)));
        }

        Ok(entries)
    }
}

#[async_trait]
impl ConnectorFactory for InMemoryConnector {
    async fn connect(&self, _configuration: &Configuration) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(self.clone()))
    }
}
