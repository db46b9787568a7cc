//! API Gateway REST プロキシ統合のイベント型とレスポンス組み立て

use crate::errors::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use domain::UserId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// API Gateway プロキシリクエスト構造体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayProxyRequest {
    pub http_method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
    #[serde(default)]
    pub request_context: RequestContext,
}

/// リクエストコンテキスト構造体
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub authorizer: Option<Authorizer>,
}

/// オーソライザーが付与したコンテキスト
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorizer {
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl ApiGatewayProxyRequest {
    /// ヘッダーを大文字小文字を区別せずに取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// オーソライザーが解決した呼び出し元のユーザーID
    ///
    /// `userId` を優先し、なければ `principalId` を使う。
    pub fn resolved_user_id(&self) -> Option<&str> {
        let authorizer = self.request_context.authorizer.as_ref()?;
        authorizer
            .user_id
            .as_deref()
            .or(authorizer.principal_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    /// 呼び出し元の `UserId`（解決できなければ認証エラー）
    pub fn caller_id(&self) -> Result<UserId, AppError> {
        let user_id = self
            .resolved_user_id()
            .ok_or_else(|| AppError::Authentication("認証情報が見つかりません".to_string()))?;
        Ok(UserId::from_string(user_id.to_string())?)
    }

    /// ボディを文字列として取得（Base64 エンコードされていればデコード）
    pub fn body_text(&self) -> Result<Option<String>, AppError> {
        let Some(body) = &self.body else {
            return Ok(None);
        };

        if !self.is_base64_encoded {
            return Ok(Some(body.clone()));
        }

        let bytes = STANDARD
            .decode(body)
            .map_err(|e| AppError::Deserialization(format!("Base64 のデコードに失敗: {e}")))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| AppError::Deserialization(format!("ボディが UTF-8 ではありません: {e}")))
    }

    /// ボディを JSON としてパース
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let body = self
            .body_text()?
            .filter(|body| !body.trim().is_empty())
            .ok_or_else(|| AppError::Validation("リクエストボディが必要です".to_string()))?;

        serde_json::from_str(&body)
            .map_err(|e| AppError::Deserialization(format!("リクエストボディのパースエラー: {e}")))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_context.request_id.as_deref()
    }
}

/// API Gateway プロキシレスポンス構造体
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// すべてのレスポンスに付与する CORS ヘッダー
pub fn cors_headers() -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
    headers.insert(
        "Access-Control-Allow-Credentials".to_string(),
        "true".to_string(),
    );
    headers.insert(
        "Access-Control-Allow-Headers".to_string(),
        "Content-Type,Authorization".to_string(),
    );
    headers.insert(
        "Access-Control-Allow-Methods".to_string(),
        "GET,POST,PATCH,DELETE,OPTIONS".to_string(),
    );
    headers
}

/// JSON レスポンスを作成
pub fn json_response(status_code: u16, body: Value) -> ApiGatewayProxyResponse {
    let mut headers = cors_headers();
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    ApiGatewayProxyResponse {
        status_code,
        headers,
        body: body.to_string(),
        is_base64_encoded: false,
    }
}

/// ボディなしのレスポンスを作成
pub fn empty_response(status_code: u16) -> ApiGatewayProxyResponse {
    ApiGatewayProxyResponse {
        status_code,
        headers: cors_headers(),
        body: String::new(),
        is_base64_encoded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(event: Value) -> ApiGatewayProxyRequest {
        serde_json::from_value(event).unwrap()
    }

    #[test]
    fn test_deserialize_proxy_event() {
        let request = parse(json!({
            "httpMethod": "PATCH",
            "path": "/todos/abc",
            "resource": "/todos/{todoId}",
            "pathParameters": {"todoId": "abc"},
            "headers": {"Content-Type": "application/json"},
            "body": "{\"name\":\"Walk\",\"done\":true}",
            "isBase64Encoded": false,
            "requestContext": {
                "requestId": "req-1",
                "authorizer": {"principalId": "user-1", "userId": "user-1"}
            }
        }));

        assert_eq!(request.http_method, "PATCH");
        assert_eq!(request.path_parameter("todoId"), Some("abc"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.resolved_user_id(), Some("user-1"));
        assert_eq!(request.request_id(), Some("req-1"));
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let request = parse(json!({"httpMethod": "GET", "path": "/todos"}));

        assert!(request.resolved_user_id().is_none());
        assert!(matches!(
            request.caller_id(),
            Err(AppError::Authentication(_))
        ));
        assert!(request.path_parameter("todoId").is_none());
        assert!(request.body_text().unwrap().is_none());
    }

    #[test]
    fn test_resolved_user_id_falls_back_to_principal() {
        let request = parse(json!({
            "httpMethod": "GET",
            "requestContext": {"authorizer": {"principalId": "user-9"}}
        }));
        assert_eq!(request.resolved_user_id(), Some("user-9"));
        assert_eq!(request.caller_id().unwrap().as_str(), "user-9");
    }

    #[test]
    fn test_base64_body_is_decoded() {
        let request = parse(json!({
            "httpMethod": "POST",
            "body": STANDARD.encode(r#"{"name":"Buy milk"}"#),
            "isBase64Encoded": true
        }));

        let body: Value = request.json_body().unwrap();
        assert_eq!(body["name"], "Buy milk");
    }

    #[test]
    fn test_json_body_errors() {
        let empty = parse(json!({"httpMethod": "POST"}));
        assert!(matches!(
            empty.json_body::<Value>(),
            Err(AppError::Validation(_))
        ));

        let broken = parse(json!({"httpMethod": "POST", "body": "{not json"}));
        assert!(matches!(
            broken.json_body::<Value>(),
            Err(AppError::Deserialization(_))
        ));
    }

    #[test]
    fn test_responses_carry_cors_headers() {
        let response = json_response(201, json!({"item": {}}));
        assert_eq!(response.status_code, 201);
        assert_eq!(
            response.headers.get("Access-Control-Allow-Origin"),
            Some(&"*".to_string())
        );
        assert_eq!(
            response.headers.get("Access-Control-Allow-Credentials"),
            Some(&"true".to_string())
        );
        assert_eq!(
            response.headers.get("Content-Type"),
            Some(&"application/json".to_string())
        );

        let empty = empty_response(204);
        assert!(empty.body.is_empty());
        assert!(empty.headers.contains_key("Access-Control-Allow-Origin"));
        assert!(!empty.headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_response_serializes_for_api_gateway() {
        let value = serde_json::to_value(json_response(200, json!({"items": []}))).unwrap();
        assert_eq!(value["statusCode"], 200);
        assert_eq!(value["body"], r#"{"items":[]}"#);
        assert_eq!(value["isBase64Encoded"], false);
    }
}
