use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client;
use shared::Config;
use tracing::info;

/// 各 Lambda の起動時に一度だけ AWS SDK の共通設定を読み込む
pub async fn load_sdk_config(config: &Config) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .load()
        .await
}

#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    table_name: String,
    index_name: String,
}

impl DynamoDbClient {
    pub fn new(sdk_config: &SdkConfig, config: &Config) -> Self {
        let mut builder = aws_sdk_dynamodb::config::Builder::from(sdk_config);
        if let Some(endpoint) = &config.dynamodb_endpoint {
            info!(endpoint = %endpoint, "DynamoDB エンドポイントを上書きします");
            builder = builder.endpoint_url(endpoint);
        }

        Self::from_client(
            Client::from_conf(builder.build()),
            &config.todos_table,
            &config.index_name,
        )
    }

    pub fn from_client(client: Client, table_name: &str, index_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
            index_name: index_name.to_string(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// userId のセカンダリインデックス名
    pub fn index_name(&self) -> &str {
        &self.index_name
    }
}
