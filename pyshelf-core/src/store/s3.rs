//! S3-backed `PackageStore` implementation.
//!
//! Wraps `aws-sdk-s3` to work against any S3-compatible endpoint (AWS,
//! MinIO, R2, ...). Logical buckets map to key prefixes inside one physical
//! S3 bucket: `{bucket}/{filename}`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{key_prefix, object_key, PackageStore, StoreError};

/// Connection settings for the S3 store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl S3Config {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.bucket_name.trim().is_empty() {
            return Err(StoreError::Storage("bucket name cannot be empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(StoreError::Storage("region cannot be empty".into()));
        }
        if self.access_key_id.trim().is_empty() {
            return Err(StoreError::Storage("access key ID cannot be empty".into()));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(StoreError::Storage(
                "secret access key cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// S3-backed package store.
pub struct S3PackageStore {
    client: Client,
    bucket_name: String,
}

impl S3PackageStore {
    pub async fn new(config: S3Config) -> Result<Self, StoreError> {
        config.validate()?;

        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "pyshelf-s3-config",
        );

        let mut builder = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);

        if let Some(ref ep) = config.endpoint_url {
            builder = builder.endpoint_url(ep.trim_end_matches('/'));
        }

        let aws_config = builder.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();
        let client = Client::from_conf(s3_config);

        Ok(S3PackageStore {
            client,
            bucket_name: config.bucket_name,
        })
    }
}

#[async_trait]
impl PackageStore for S3PackageStore {
    async fn exists(&self, bucket: &str, filename: &str) -> Result<bool, StoreError> {
        let key = object_key(bucket, filename);
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = format!("{e}");
                if msg.contains("NotFound")
                    || msg.contains("not found")
                    || msg.contains("404")
                    || msg.contains("NoSuchKey")
                {
                    Ok(false)
                } else {
                    Err(StoreError::Storage(format!("head {key}: {e}")))
                }
            }
        }
    }

    async fn write(&self, bucket: &str, filename: &str, data: Vec<u8>) -> Result<(), StoreError> {
        let key = object_key(bucket, filename);

        debug!("Storing {} ({} bytes)", key, data.len());
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(data.into())
            .content_type("application/x-gzip")
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn read(&self, bucket: &str, filename: &str) -> Result<Vec<u8>, StoreError> {
        let key = object_key(bucket, filename);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let msg = format!("{e}");
                if msg.contains("NoSuchKey") || msg.contains("not found") || msg.contains("404") {
                    StoreError::NotFound(key.clone())
                } else {
                    StoreError::Storage(format!("get {key}: {e}"))
                }
            })?;

        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Storage(format!("read body for {key}: {e}")))?
            .into_bytes()
            .to_vec();

        debug!("Read {} ({} bytes)", key, bytes.len());
        Ok(bytes)
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let full_prefix = key_prefix(bucket, prefix);
        let strip = format!("{bucket}/");

        let mut filenames = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(&full_prefix);

            if let Some(token) = continuation_token.take() {
                req = req.continuation_token(token);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| StoreError::Storage(format!("list {full_prefix}: {e}")))?;

            for obj in resp.contents() {
                if let Some(key) = obj.key() {
                    if let Some(filename) = key.strip_prefix(&strip) {
                        filenames.push(filename.to_string());
                    }
                }
            }

            if resp.is_truncated() == Some(true) {
                continuation_token = resp.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        Ok(filenames)
    }
}
