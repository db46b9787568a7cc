use application::TodoService;
use domain::{CreateTodoRequest, TodoId, UpdateTodoRequest};
use infrastructure::{
    load_sdk_config, DynamoDbClient, DynamoDbTodoRepository, S3AttachmentStore,
};
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

/// 業務操作が失敗した場合のステータス
const OPERATION_FAILURE_STATUS: u16 = 500;

/// コマンドの種類を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Preflight,
    CreateTodo,
    UpdateTodo,
    DeleteTodo,
    GenerateUploadUrl,
    Unsupported,
}

/// コマンドハンドラーのメイン関数
async fn function_handler(
    service: &TodoService,
    event: LambdaEvent<ApiGatewayProxyRequest>,
) -> Result<ApiGatewayProxyResponse, Error> {
    let (payload, context) = event.into_parts();

    trace_lambda_handler!("command-handler", context, async {
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

/// リソーステンプレート（なければパス）からルートを決める
fn resolve_route(request: &ApiGatewayProxyRequest) -> Route {
    let route = request.resource.as_deref().unwrap_or(&request.path);
    let segments: Vec<&str> = route.trim_matches('/').split('/').collect();

    match (request.http_method.as_str(), segments.as_slice()) {
        ("OPTIONS", _) => Route::Preflight,
        ("POST", ["todos"]) => Route::CreateTodo,
        ("PATCH", ["todos", _]) => Route::UpdateTodo,
        ("DELETE", ["todos", _]) => Route::DeleteTodo,
        ("POST", ["todos", _, "attachment"]) => Route::GenerateUploadUrl,
        _ => Route::Unsupported,
    }
}

/// パスパラメータ（なければパス）から TodoId を取り出す
fn extract_todo_id(request: &ApiGatewayProxyRequest) -> Result<TodoId, AppError> {
    let from_path = || {
        request
            .resource
            .is_none()
            .then(|| request.path.trim_matches('/').split('/').nth(1))
            .flatten()
    };

    let todo_id = request
        .path_parameter("todoId")
        .or_else(from_path)
        .ok_or_else(|| AppError::Validation("todoId が必要です".to_string()))?;

    Ok(TodoId::from_string(todo_id.to_string())?)
}

/// リクエストを処理する
async fn handle_request(
    service: &TodoService,
    request: &ApiGatewayProxyRequest,
) -> Result<ApiGatewayProxyResponse, Error> {
    info!(method = %request.http_method, path = %request.path, "CommandHandler開始");

    match resolve_route(request) {
        Route::Preflight => Ok(empty_response(204)),
        Route::CreateTodo => {
            let user_id = handle_lambda_error!(request.caller_id(), request);
            let body: CreateTodoRequest = handle_lambda_error!(request.json_body(), request);

            let item = handle_lambda_error!(
                service.create_todo(body, &user_id).await,
                request,
                OPERATION_FAILURE_STATUS
            );

            Ok(json_response(201, json!({ "item": item })))
        }
        Route::UpdateTodo => {
            let user_id = handle_lambda_error!(request.caller_id(), request);
            let todo_id = handle_lambda_error!(extract_todo_id(request), request);
            let body: UpdateTodoRequest = handle_lambda_error!(request.json_body(), request);

            handle_lambda_error!(
                service.update_todo(&todo_id, body, &user_id).await,
                request,
                OPERATION_FAILURE_STATUS
            );

            Ok(empty_response(204))
        }
        Route::DeleteTodo => {
            let user_id = handle_lambda_error!(request.caller_id(), request);
            let todo_id = handle_lambda_error!(extract_todo_id(request), request);

            handle_lambda_error!(
                service.delete_todo(&todo_id, &user_id).await,
                request,
                OPERATION_FAILURE_STATUS
            );

            Ok(empty_response(200))
        }
        Route::GenerateUploadUrl => {
            let user_id = handle_lambda_error!(request.caller_id(), request);
            let todo_id = handle_lambda_error!(extract_todo_id(request), request);

            // 署名付き URL の発行後に添付 URL を記録する
            let upload_url = handle_lambda_error!(
                service.get_upload_url(&todo_id).await,
                request,
                OPERATION_FAILURE_STATUS
            );
            handle_lambda_error!(
                service.attach_url(&user_id, &todo_id).await,
                request,
                OPERATION_FAILURE_STATUS
            );

            Ok(json_response(200, json!({ "uploadUrl": upload_url })))
        }
        Route::Unsupported => {
            let error = AppError::NotFound(format!(
                "サポートされていないメソッドまたはパス: {} {}",
                request.http_method, request.path
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
    let attachments = S3AttachmentStore::new(&sdk_config, &config);
    let service = TodoService::new(Arc::new(repository), Arc::new(attachments));

    let service = &service;
    run(service_fn(move |event| async move {
        function_handler(service, event).await
    }))
    .await
}
