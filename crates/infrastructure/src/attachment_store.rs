//! 添付ファイル用のオブジェクトストア
//!
//! クライアントは S3 に直接 PUT し、サーバーは Presigned URL の発行と
//! 公開 URL の組み立てだけを行う。

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use shared::telemetry::trace_store_operation;
use shared::{AppError, Config};
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Presigned PUT URL を生成する（アップロード用）
    async fn presigned_upload_url(&self, object_key: &str) -> Result<String, AppError>;

    /// オブジェクトの公開 URL
    fn public_url(&self, object_key: &str) -> String;
}

/// `https://{bucket}.{host}/{key}` 形式の URL を組み立てる
pub fn public_object_url(bucket: &str, storage_host: &str, object_key: &str) -> String {
    format!("https://{bucket}.{storage_host}/{object_key}")
}

pub struct S3AttachmentStore {
    client: Client,
    bucket_name: String,
    storage_host: String,
    expires_in: Duration,
}

impl S3AttachmentStore {
    pub fn new(sdk_config: &SdkConfig, config: &Config) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        // エンドポイント指定時（MinIO / LocalStack）はパススタイルが必要
        if let Some(endpoint) = &config.s3_endpoint {
            info!(endpoint = %endpoint, "S3 エンドポイントを上書きします");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_client(
            Client::from_conf(builder.build()),
            &config.attachments_bucket,
            &config.storage_host,
            config.signed_url_expiration,
        )
    }

    pub fn from_client(
        client: Client,
        bucket_name: &str,
        storage_host: &str,
        expires_in: Duration,
    ) -> Self {
        Self {
            client,
            bucket_name: bucket_name.to_string(),
            storage_host: storage_host.to_string(),
            expires_in,
        }
    }
}

#[async_trait]
impl AttachmentStore for S3AttachmentStore {
    async fn presigned_upload_url(&self, object_key: &str) -> Result<String, AppError> {
        let presign_config = PresigningConfig::expires_in(self.expires_in)
            .map_err(|e| AppError::ObjectStore(format!("Presigned 設定の構築に失敗: {e}")))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(object_key)
            .presigned(presign_config);

        let presigned = trace_store_operation("s3", "PresignPutObject", async {
            request.await.map_err(|e| {
                AppError::ObjectStore(format!(
                    "Presigned PUT URL の生成に失敗: {}",
                    DisplayErrorContext(&e)
                ))
            })
        })
        .await?;

        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, object_key: &str) -> String {
        public_object_url(&self.bucket_name, &self.storage_host, object_key)
    }
}
