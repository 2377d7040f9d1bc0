use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;

/// Presigned upload URLs are valid for 10 minutes.
const UPLOAD_URL_TTL_SECS: u64 = 10 * 60;

/// Read URLs are long-lived so clients can cache them.
const READ_URL_TTL_SECS: u64 = 7 * 24 * 3600;

#[derive(Clone)]
pub struct StorageClient {
    client: S3Client,
    bucket: String,
}

impl StorageClient {
    pub async fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "minio");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let client = S3Client::from_conf(config);

        // Ensure bucket exists
        let _ = client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await;

        tracing::info!(endpoint = %endpoint, bucket = %bucket, "storage client initialized");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Generate a presigned URL the client can PUT the object to directly.
    pub async fn presigned_upload_url(&self, key: &str) -> Result<String, String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(Duration::from_secs(UPLOAD_URL_TTL_SECS))
            .build()
            .map_err(|e| format!("presign config error: {e}"))?;

        let url = self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| format!("presign error: {e}"))?
            .uri()
            .to_string();

        Ok(url)
    }

    /// Generate a presigned URL for downloading.
    pub async fn presigned_download_url(&self, key: &str) -> Result<String, String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(Duration::from_secs(READ_URL_TTL_SECS))
            .build()
            .map_err(|e| format!("presign config error: {e}"))?;

        let url = self.client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| format!("presign error: {e}"))?
            .uri()
            .to_string();

        Ok(url)
    }

    /// Delete an object. Callers treat failures as non-fatal.
    pub async fn delete(&self, key: &str) -> Result<(), String> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| format!("delete failed: {e}"))?;

        Ok(())
    }
}
