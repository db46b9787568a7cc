use std::collections::HashMap;
use uuid::Uuid;

use crate::api_gateway::{json_response, ApiGatewayProxyResponse};
use crate::errors::{AppError, ErrorCategory, ErrorResponse, ErrorSeverity};

/// Lambda関数用のエラーハンドリングユーティリティ
pub struct LambdaErrorHandler;

impl LambdaErrorHandler {
    /// AppErrorを指定ステータスのAPI Gatewayレスポンスに変換
    pub fn error_response(
        error: &AppError,
        status_code: u16,
        request_id: Option<String>,
    ) -> ApiGatewayProxyResponse {
        let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let error_response = ErrorResponse::from_app_error(error, request_id);

        let body = serde_json::to_value(&error_response)
            .unwrap_or_else(|_| serde_json::json!({ "error": error.to_string() }));

        let mut response = json_response(status_code, body);
        response
            .headers
            .insert("X-Request-ID".to_string(), error_response.request_id);
        response
    }

    /// クライアント起因のエラーは既定ステータス、サーバー側の失敗は `server_status`
    pub fn status_for(error: &AppError, server_status: u16) -> u16 {
        match error.metadata().category {
            ErrorCategory::Client => error.http_status_code(),
            ErrorCategory::Server => server_status,
        }
    }

    /// エラーの既定ステータスでレスポンスを作成
    pub fn to_api_gateway_response(
        error: &AppError,
        request_id: Option<String>,
    ) -> ApiGatewayProxyResponse {
        Self::error_response(error, error.http_status_code(), request_id)
    }

    /// エラーをログに記録
    pub fn log_error(error: &AppError, context: Option<HashMap<String, String>>) {
        let metadata = error.metadata();

        match metadata.severity {
            ErrorSeverity::Critical => {
                tracing::error!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    context = ?context,
                    "Critical error occurred"
                );
            }
            ErrorSeverity::Error => {
                tracing::error!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    context = ?context,
                    "Error occurred"
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    context = ?context,
                    "Warning occurred"
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error = %error,
                    code = %metadata.code,
                    category = ?metadata.category,
                    context = ?context,
                    "Info level error occurred"
                );
            }
        }
    }
}

/// ハンドラー内のエラーをエラーレスポンスとして早期リターンする
///
/// 第 3 引数はサーバー側の失敗に使うステータス。省略するとエラーの既定ステータスを使う。
#[macro_export]
macro_rules! handle_lambda_error {
    ($result:expr, $request:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => {
                let error: $crate::errors::AppError = error.into();
                let status = error.http_status_code();
                $crate::lambda_error::LambdaErrorHandler::log_error(&error, None);

                return Ok($crate::lambda_error::LambdaErrorHandler::error_response(
                    &error,
                    status,
                    $request.request_id().map(str::to_string),
                ));
            }
        }
    };

    ($result:expr, $request:expr, $server_status:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => {
                let error: $crate::errors::AppError = error.into();
                let status =
                    $crate::lambda_error::LambdaErrorHandler::status_for(&error, $server_status);
                $crate::lambda_error::LambdaErrorHandler::log_error(&error, None);

                return Ok($crate::lambda_error::LambdaErrorHandler::error_response(
                    &error,
                    status,
                    $request.request_id().map(str::to_string),
                ));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_gateway::ApiGatewayProxyRequest;

    #[test]
    fn test_api_gateway_response_creation() {
        let error = AppError::NotFound("Todo not found".to_string());
        let response =
            LambdaErrorHandler::to_api_gateway_response(&error, Some("test-request-id".to_string()));

        assert_eq!(response.status_code, 404);
        assert!(response.body.contains("NOT_FOUND"));
        assert!(response.body.contains("test-request-id"));
        assert_eq!(
            response.headers.get("X-Request-ID"),
            Some(&"test-request-id".to_string())
        );
        assert!(response.headers.contains_key("Access-Control-Allow-Origin"));
    }

    #[test]
    fn test_error_response_uses_given_status() {
        let error = AppError::DynamoDb("throttled".to_string());
        let response = LambdaErrorHandler::error_response(&error, 404, None);

        assert_eq!(response.status_code, 404);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["error"], "DynamoDB error: throttled");
        assert!(!body["requestId"].as_str().unwrap().is_empty());
    }

    fn run_with_default_status(
        request: &ApiGatewayProxyRequest,
        result: Result<u16, AppError>,
    ) -> Result<ApiGatewayProxyResponse, lambda_runtime::Error> {
        let status = handle_lambda_error!(result, request);
        Ok(crate::api_gateway::empty_response(status))
    }

    fn run_with_status(
        request: &ApiGatewayProxyRequest,
        result: Result<u16, AppError>,
    ) -> Result<ApiGatewayProxyResponse, lambda_runtime::Error> {
        let status = handle_lambda_error!(result, request, 500);
        Ok(crate::api_gateway::empty_response(status))
    }

    #[test]
    fn test_handle_lambda_error_macro() {
        let request = ApiGatewayProxyRequest::default();

        let ok = run_with_default_status(&request, Ok(204)).unwrap();
        assert_eq!(ok.status_code, 204);

        let bad = run_with_default_status(
            &request,
            Err(AppError::Validation("name は必須です".to_string())),
        )
        .unwrap();
        assert_eq!(bad.status_code, 400);

        let invalid =
            run_with_status(&request, Err(AppError::Validation("x".to_string()))).unwrap();
        assert_eq!(invalid.status_code, 400);

        let failed =
            run_with_status(&request, Err(AppError::DynamoDb("x".to_string()))).unwrap();
        assert_eq!(failed.status_code, 500);
    }
}
