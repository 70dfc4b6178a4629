//! S3-compatible backend (R2 in production).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use crate::config::StorageConfig;
use crate::{ObjectStore, StorageError};

pub struct S3Store {
    client: Client,
    bucket: String,
    endpoint: String,
    public_base_url: Option<String>,
}

impl S3Store {
    /// Build a client against the configured endpoint. R2 uses the
    /// literal region `auto`.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| StorageError::Backend {
            message: "storage endpoint is not configured".into(),
            retryable: false,
        })?;

        let credentials = Credentials::new(
            config.access_key_id.clone().unwrap_or_default(),
            config.secret_access_key.clone().unwrap_or_default(),
            None,
            None,
            "fleetdoc",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .endpoint_url(endpoint.clone())
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&sdk_config),
            bucket: config.bucket.clone(),
            endpoint,
            public_base_url: config.public_base_url.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| StorageError::Backend {
                message: err.to_string(),
                retryable: true,
            })?;

        tracing::debug!(key, size, "stored object");
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound { key: key.to_string() }
                } else {
                    StorageError::Backend {
                        message: service_err.to_string(),
                        retryable: true,
                    }
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend {
                message: e.to_string(),
                retryable: true,
            })?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StorageError::Backend {
                message: err.to_string(),
                retryable: true,
            })?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Backend {
                        message: service_err.to_string(),
                        retryable: true,
                    })
                }
            }
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(ref token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|err| StorageError::Backend {
                message: err.to_string(),
                retryable: true,
            })?;

            if let Some(contents) = &response.contents {
                keys.extend(
                    contents
                        .iter()
                        .filter_map(|obj| obj.key().map(str::to_string)),
                );
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token.clone();
            } else {
                break;
            }
        }

        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{key}", base.trim_end_matches('/')),
            None => format!(
                "{}/{}/{key}",
                self.endpoint.trim_end_matches('/'),
                self.bucket
            ),
        }
    }
}
