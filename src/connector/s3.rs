//! S3 connector implementation
//!
//! Talks to Amazon S3 or any S3-compatible store (MinIO, LocalStack, etc.)
//! through the AWS SDK.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::config::{Configuration, SignatureVersion};
use crate::connector::{
    Acl, ByteRange, Connector, ConnectorError, ConnectorFactory, ConnectorResult, ListEntry,
    ListRequest, ObjectHead, ObjectInput, RequestHeaders,
};
use crate::error::Result;

/// Region used when the configuration names none
const DEFAULT_REGION: &str = "us-east-1";

/// Prefix of user metadata headers
const META_HEADER_PREFIX: &str = "x-amz-meta-";

/// S3 connector for Amazon S3 and S3-compatible storage
pub struct S3Connector {
    client: Client,
    endpoint: String,
}

impl S3Connector {
    /// Create a new S3 connector from connection parameters
    pub async fn new(configuration: &Configuration) -> Result<Self> {
        if configuration.signature() == SignatureVersion::V2 {
            warn!("signature v2 is not supported by the S3 client, signing with v4");
        }

        let credentials = Credentials::new(
            configuration.access_key(),
            configuration.secret_key(),
            None,
            None,
            "bucket-fs",
        );
        let region = configuration.region().unwrap_or(DEFAULT_REGION).to_string();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if configuration.custom_endpoint().is_some() {
            s3_config_builder = s3_config_builder.endpoint_url(configuration.endpoint_url());
        }

        if configuration.use_legacy_path_style() {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            endpoint: configuration.endpoint_url(),
        })
    }

    async fn body(input: ObjectInput) -> std::result::Result<ByteStream, String> {
        match input {
            ObjectInput::Data(data) => Ok(ByteStream::from(data)),
            ObjectInput::DirectoryMarker => Ok(ByteStream::from(Bytes::new())),
            ObjectInput::File(path) => ByteStream::from_path(&path)
                .await
                .map_err(|e| format!("reading {:?}: {}", path, e)),
        }
    }
}

/// Headers S3 models as dedicated PutObject fields
#[derive(Default)]
struct PutHeaders {
    content_type: Option<String>,
    cache_control: Option<String>,
    content_disposition: Option<String>,
    content_encoding: Option<String>,
    metadata: HashMap<String, String>,
}

fn split_headers(headers: &RequestHeaders) -> PutHeaders {
    let mut put = PutHeaders::default();
    for (name, value) in headers {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "content-type" => put.content_type = Some(value.clone()),
            "cache-control" => put.cache_control = Some(value.clone()),
            "content-disposition" => put.content_disposition = Some(value.clone()),
            "content-encoding" => put.content_encoding = Some(value.clone()),
            _ => {
                let key = lower
                    .strip_prefix(META_HEADER_PREFIX)
                    .unwrap_or(&lower)
                    .to_string();
                put.metadata.insert(key, value.clone());
            }
        }
    }
    put
}

#[async_trait]
impl Connector for S3Connector {
    fn store_id(&self) -> String {
        format!("s3:{}", self.endpoint)
    }

    async fn put_object(
        &self,
        input: ObjectInput,
        bucket: &str,
        key: &str,
        acl: Acl,
        headers: &RequestHeaders,
    ) -> ConnectorResult<()> {
        debug!("put_object: bucket={} key={} acl={}", bucket, key, acl.as_str());
        let cannot_put = |message: String| ConnectorError::CannotPutFile {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let body = Self::body(input).await.map_err(&cannot_put)?;
        let headers = split_headers(headers);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(acl.as_str()))
            .body(body)
            .set_content_type(headers.content_type)
            .set_cache_control(headers.cache_control)
            .set_content_disposition(headers.content_disposition)
            .set_content_encoding(headers.content_encoding)
            .set_metadata((!headers.metadata.is_empty()).then_some(headers.metadata))
            .send()
            .await
            .map_err(|e| cannot_put(format!("S3 PutObject error: {}", e.into_service_error())))?;

        Ok(())
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> ConnectorResult<Bytes> {
        trace!("get_object: bucket={} key={} range={:?}", bucket, key, range);
        let cannot_get = |message: String| ConnectorError::CannotGetFile {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(range.map(|r| r.header()))
            .send()
            .await
            .map_err(|e| cannot_get(format!("S3 GetObject error: {}", e.into_service_error())))?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| cannot_get(format!("S3 read body error: {}", e)))?;

        Ok(body.into_bytes())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ConnectorResult<()> {
        debug!("delete_object: bucket={} key={}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ConnectorError::CannotDeleteFile {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: format!("S3 DeleteObject error: {}", e.into_service_error()),
            })?;

        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ConnectorResult<ObjectHead> {
        trace!("head_object: bucket={} key={}", bucket, key);

        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ConnectorError::CannotGetFile {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: format!("S3 HeadObject error: {}", e.into_service_error()),
            })?;

        Ok(ObjectHead {
            size: output.content_length().map(|len| len.max(0) as u64),
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        request: &ListRequest<'_>,
    ) -> ConnectorResult<Vec<ListEntry>> {
        trace!(
            "list_objects: bucket={} prefix={} delimiter={:?}",
            bucket,
            request.prefix,
            request.delimiter
        );

        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let remaining = request
                .max_keys
                .map(|max| max - entries.len() as i32)
                .filter(|remaining| *remaining > 0);
            if request.max_keys.is_some() && remaining.is_none() {
                break;
            }

            let mut builder = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(request.prefix)
                .set_max_keys(remaining);

            if !request.delimiter.is_empty() {
                builder = builder.delimiter(request.delimiter);
            }

            match continuation_token.take() {
                Some(token) => builder = builder.continuation_token(token),
                None => builder = builder.set_start_after(request.marker.map(str::to_string)),
            }

            let result = builder.send().await.map_err(|e| ConnectorError::CannotGetBucket {
                bucket: bucket.to_string(),
                prefix: request.prefix.to_string(),
                message: format!("S3 ListObjectsV2 error: {}", e.into_service_error()),
            })?;

            for object in result.contents() {
                if let Some(key) = object.key() {
                    let size = object.size().map(|s| s.max(0) as u64);
                    entries.push(ListEntry::object(key, size));
                }
            }

            if request.common_prefixes {
                for common_prefix in result.common_prefixes() {
                    if let Some(p) = common_prefix.prefix() {
                        entries.push(ListEntry::common_prefix(p));
                    }
                }
            }

            if result.is_truncated().unwrap_or(false) {
                continuation_token = result.next_continuation_token().map(|s| s.to_string());
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(entries)
    }
}

/// Connects to S3 using the persisted configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct S3ConnectorFactory;

#[async_trait]
impl ConnectorFactory for S3ConnectorFactory {
    async fn connect(&self, configuration: &Configuration) -> Result<Arc<dyn Connector>> {
        Ok(Arc::new(S3Connector::new(configuration).await?))
    }
}
