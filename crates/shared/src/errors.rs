use serde::{Deserialize, Serialize};
use thiserror::Error;

/// アプリケーション全体で使用されるエラー型
#[derive(Debug, Clone, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    // インフラストラクチャエラー
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("S3 error: {0}")]
    ObjectStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // 認証エラー
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // リクエストエラー
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // システムエラー
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// エラーの分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// クライアントエラー（4xx相当）
    Client,
    /// サーバーエラー（5xx相当）
    Server,
}

/// エラーの重要度
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// エラーメタデータ
#[derive(Debug, Clone)]
pub struct ErrorMetadata {
    pub code: &'static str,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
}

impl AppError {
    /// エラーメタデータを取得
    pub fn metadata(&self) -> ErrorMetadata {
        let (code, category, severity) = match self {
            AppError::Domain(_) => ("DOMAIN_ERROR", ErrorCategory::Client, ErrorSeverity::Info),
            AppError::DynamoDb(_) => ("DYNAMODB_ERROR", ErrorCategory::Server, ErrorSeverity::Error),
            AppError::ObjectStore(_) => ("S3_ERROR", ErrorCategory::Server, ErrorSeverity::Error),
            AppError::Serialization(_) => (
                "SERIALIZATION_ERROR",
                ErrorCategory::Server,
                ErrorSeverity::Error,
            ),
            AppError::Deserialization(_) => (
                "DESERIALIZATION_ERROR",
                ErrorCategory::Client,
                ErrorSeverity::Info,
            ),
            AppError::Authentication(_) => (
                "AUTHENTICATION_ERROR",
                ErrorCategory::Client,
                ErrorSeverity::Warning,
            ),
            AppError::Validation(_) => (
                "VALIDATION_ERROR",
                ErrorCategory::Client,
                ErrorSeverity::Info,
            ),
            AppError::NotFound(_) => ("NOT_FOUND", ErrorCategory::Client, ErrorSeverity::Info),
            AppError::Configuration(_) => (
                "CONFIGURATION_ERROR",
                ErrorCategory::Server,
                ErrorSeverity::Critical,
            ),
            AppError::Internal(_) => (
                "INTERNAL_ERROR",
                ErrorCategory::Server,
                ErrorSeverity::Critical,
            ),
        };

        ErrorMetadata {
            code,
            category,
            severity,
        }
    }

    /// HTTPステータスコードを取得
    pub fn http_status_code(&self) -> u16 {
        match self.metadata().category {
            ErrorCategory::Client => match self {
                AppError::NotFound(_) => 404,
                AppError::Authentication(_) => 401,
                _ => 400,
            },
            ErrorCategory::Server => 500,
        }
    }
}

/// エラーレスポンスのボディ
///
/// `error` には内部のエラーメッセージをそのまま載せる。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub request_id: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError, request_id: String) -> Self {
        Self {
            error: error.to_string(),
            code: error.metadata().code.to_string(),
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|e| AppError::Serialization(e.to_string()))
    }
}
