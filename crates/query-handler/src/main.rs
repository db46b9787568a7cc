use application::TodoQueryService;
use infrastructure::{load_sdk_config, DynamoDbClient, DynamoDbTodoRepository};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::json;
use shared::lambda_error::LambdaErrorHandler;
use shared::telemetry::trace_http_request;
use shared::{
    empty_response, handle_lambda_error, init_tracing, json_response, trace_lambda_handler,
    ApiGatewayProxyRequest, ApiGatewayProxyResponse, AppError, Config,
};
use std::sync::Arc;
use tracing::{error, info};

/// 一覧取得失敗時のステータス
const LIST_FAILURE_STATUS: u16 = 404;

/// クエリハンドラーのメイン関数
async fn function_handler(
    service: &TodoQueryService,
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (payload, context) = event.into_parts();

    trace_lambda_handler!("query-handler", context, async {
        let response = handle_request(service, &payload).await?;
        trace_http_request(
            &payload.http_method,
            &payload.path,
            response.status_code,
            payload.resolved_user_id(),
        );
        Ok::<_, Error>(response)
    })
}

/// リクエストを処理する
async fn handle_request(
    service: &TodoQueryService,
    request: &ApiGatewayProxyRequest,
) -> Result<ApiGatewayProxyResponse, Error> {
    info!(method = %request.http_method, path = %request.path, "QueryHandler開始");

    let route = request.resource.as_deref().unwrap_or(&request.path);
    match (request.http_method.as_str(), route.trim_end_matches('/')) {
        ("OPTIONS", _) => Ok(empty_response(204)),
        ("GET", "/todos") => {
            let user_id = handle_lambda_error!(request.caller_id(), request);
            let items = handle_lambda_error!(
                service.list_todos(&user_id).await,
                request,
                LIST_FAILURE_STATUS
            );

            info!(user_id = %user_id, count = items.len(), "ToDo一覧を返します");
            Ok(json_response(200, json!({ "items": items })))
        }
        (method, path) => {
            let error = AppError::NotFound(format!(
                "サポートされていないメソッドまたはパス: {method} {path}"
            ));
            LambdaErrorHandler::log_error(&error, None);
            Ok(LambdaErrorHandler::to_api_gateway_response(
                &error,
                request.request_id().map(str::to_string),
            ))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = init_tracing() {
        eprintln!("トレーシング初期化エラー: {e}");
        // トレーシング初期化に失敗してもアプリケーションは継続
    }

    let config = Config::from_env().map_err(|e| {
        error!("設定読み込みエラー: {}", e);
        Error::from(format!("設定エラー: {e}"))
    })?;

    // クライアントはコンテナ内で一度だけ構築する
    let sdk_config = load_sdk_config(&config).await;
    let repository = DynamoDbTodoRepository::new(DynamoDbClient::new(&sdk_config, &config));
    let service = TodoQueryService::new(Arc::new(repository));

    let service = &service;
    run(service_fn(move |event| async move {
        function_handler(service, event).await
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CreateTodoRequest, TodoId, TodoItem, UserId};
    use infrastructure::{InMemoryTodoRepository, TodoRepository};
    use serde_json::Value;

    fn service_with(repository: InMemoryTodoRepository) -> TodoQueryService {
        TodoQueryService::new(Arc::new(repository))
    }

    fn todo(owner: &str, name: &str) -> TodoItem {
        TodoItem::new(
            TodoId::new(),
            UserId::from_string(owner.to_string()).unwrap(),
            CreateTodoRequest {
                name: name.to_string(),
                due_date: None,
            },
            chrono::Utc::now(),
        )
    }

    fn request(method: &str, user_id: Option<&str>) -> ApiGatewayProxyRequest {
        let mut event = json!({
            "httpMethod": method,
            "path": "/todos",
            "resource": "/todos",
            "requestContext": {"requestId": "req-1"}
        });
        if let Some(user_id) = user_id {
            event["requestContext"]["authorizer"] =
                json!({"principalId": user_id, "userId": user_id});
        }
        serde_json::from_value(event).unwrap()
    }

    fn body(response: &ApiGatewayProxyResponse) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_list_returns_only_callers_items() {
        // Arrange
        let repository = InMemoryTodoRepository::new();
        repository.create(&todo("user-1", "Buy milk")).await.unwrap();
        repository.create(&todo("user-2", "Secret")).await.unwrap();
        let service = service_with(repository);

        // Act
        let response = handle_request(&service, &request("GET", Some("user-1")))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status_code, 200);
        let items = body(&response)["items"].as_array().unwrap().clone();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "Buy milk");
        assert_eq!(items[0]["done"], false);
        assert_eq!(items[0]["userId"], "user-1");
        assert_eq!(
            response.headers.get("Access-Control-Allow-Credentials"),
            Some(&"true".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_list_is_ok() {
        let service = service_with(InMemoryTodoRepository::new());

        let response = handle_request(&service, &request("GET", Some("user-1")))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(body(&response), json!({"items": []}));
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_404_with_raw_message() {
        let service = service_with(InMemoryTodoRepository::failing(
            "ResourceNotFoundException: Requested resource not found",
        ));

        let response = handle_request(&service, &request("GET", Some("user-1")))
            .await
            .unwrap();

        assert_eq!(response.status_code, 404);
        assert_eq!(
            body(&response)["error"],
            "DynamoDB error: ResourceNotFoundException: Requested resource not found"
        );
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let service = service_with(InMemoryTodoRepository::new());

        let response = handle_request(&service, &request("GET", None)).await.unwrap();

        assert_eq!(response.status_code, 401);
    }

    #[tokio::test]
    async fn test_options_and_unknown_routes() {
        let service = service_with(InMemoryTodoRepository::new());

        let preflight = handle_request(&service, &request("OPTIONS", None))
            .await
            .unwrap();
        assert_eq!(preflight.status_code, 204);
        assert!(preflight.body.is_empty());

        let unknown = handle_request(&service, &request("DELETE", Some("user-1")))
            .await
            .unwrap();
        assert_eq!(unknown.status_code, 404);
    }
}
