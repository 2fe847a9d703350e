//! S3 implementation of the core [`ObjectStore`] contract.
//!
//! One [`S3ObjectStore`] is built per configured portal, since every portal
//! carries its own endpoint, region and credentials. Both the data bucket and
//! the status bucket of a portal are reached through the same client.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use portals_core::config::PortalConfig;
use portals_core::contract::{ObjectStore, ObjectSummary, StoreError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(portal: &PortalConfig) -> Self {
        info!(
            host_url = %portal.host_url,
            region = %portal.region,
            bucket = %portal.bucket,
            "Connecting to object storage"
        );

        let aws_config = aws_config::from_env()
            .endpoint_url(&portal.host_url)
            .region(Region::new(portal.region.clone()))
            .credentials_provider(Credentials::new(
                portal.access_key.clone(),
                portal.secret_key.clone(),
                None,
                None,
                "portals",
            ))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

fn to_chrono(timestamp: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    timestamp
        .and_then(|d| DateTime::from_timestamp(d.secs(), d.subsec_nanos()))
        .unwrap_or_default()
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, bucket: &str) -> Result<Vec<ObjectSummary>, StoreError> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| StoreError::List {
                    bucket: bucket.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })?;

            if let Some(contents) = res.contents {
                for object in contents {
                    let last_modified = to_chrono(object.last_modified.as_ref());
                    if let Some(key) = object.key {
                        objects.push(ObjectSummary {
                            key,
                            last_modified,
                            size: object.size.unwrap_or(0),
                        });
                    }
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        debug!(bucket, count = objects.len(), "Listed bucket");
        Ok(objects)
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<u64, StoreError> {
        let download_error = |message: String| StoreError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let res = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| download_error(DisplayErrorContext(&e).to_string()))?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(destination)
            .await?;
        let mut body = res.body;
        let mut written = 0u64;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| download_error(e.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}
