use lambda_runtime::Context;
use std::fmt::Display;
use std::future::Future;
use tracing::{error, info, warn};

/// Lambda 関数のトレーシング情報
#[derive(Debug)]
pub struct LambdaTraceContext {
    pub function_name: String,
    pub function_version: String,
    pub request_id: String,
    pub trace_id: Option<String>,
}

impl LambdaTraceContext {
    /// Lambda Context からトレーシング情報を抽出
    pub fn from_lambda_context(context: &Context) -> Self {
        Self {
            function_name: context.env_config.function_name.clone(),
            function_version: context.env_config.version.clone(),
            request_id: context.request_id.clone(),
            trace_id: context
                .xray_trace_id
                .clone()
                .or_else(|| std::env::var("_X_AMZN_TRACE_ID").ok()),
        }
    }
}

/// Lambda 関数実行をトレースするマクロ
///
/// ハンドラーの future をスパンで計装し、開始と終了を記録する。
#[macro_export]
macro_rules! trace_lambda_handler {
    ($handler_name:expr, $context:expr, $handler:expr) => {{
        use ::tracing::Instrument as _;
        use $crate::telemetry::{create_lambda_span, LambdaTraceContext};

        let trace_context = LambdaTraceContext::from_lambda_context(&$context);
        let span = create_lambda_span($handler_name, &trace_context);

        async move {
            ::tracing::info!(
                function_name = %trace_context.function_name,
                request_id = %trace_context.request_id,
                "Lambda function started"
            );

            let result = $handler.await;

            match &result {
                Ok(_) => ::tracing::info!("Lambda function completed successfully"),
                Err(e) => ::tracing::error!(error = %e, "Lambda function failed"),
            }

            result
        }
        .instrument(span)
        .await
    }};
}

/// Lambda 関数用のスパンを作成
pub fn create_lambda_span(handler_name: &str, trace_context: &LambdaTraceContext) -> tracing::Span {
    tracing::span!(
        tracing::Level::INFO,
        "lambda_handler",
        handler = handler_name,
        function_name = %trace_context.function_name,
        function_version = %trace_context.function_version,
        request_id = %trace_context.request_id,
        trace_id = %trace_context.trace_id.as_deref().unwrap_or("none")
    )
}

/// DynamoDB / S3 への 1 回の呼び出しをトレース
pub async fn trace_store_operation<T, E, Fut>(
    store: &str,
    operation_name: &str,
    operation: Fut,
) -> Result<T, E>
where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
{
    let start_time = std::time::Instant::now();
    let result = operation.await;
    let duration = start_time.elapsed();

    match &result {
        Ok(_) => {
            info!(
                store = store,
                operation = operation_name,
                duration_ms = duration.as_millis() as u64,
                "Store operation completed successfully"
            );
        }
        Err(e) => {
            error!(
                store = store,
                operation = operation_name,
                duration_ms = duration.as_millis() as u64,
                error = %e,
                "Store operation failed"
            );
        }
    }

    result
}

/// HTTP リクエスト/レスポンスを記録
pub fn trace_http_request(method: &str, path: &str, status_code: u16, user_id: Option<&str>) {
    if status_code >= 400 {
        warn!(
            method = method,
            path = path,
            status_code = status_code,
            user_id = user_id,
            "HTTP request failed"
        );
    } else {
        info!(
            method = method,
            path = path,
            status_code = status_code,
            user_id = user_id,
            "HTTP request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trace_store_operation_passes_result_through() {
        let ok: Result<u32, String> =
            trace_store_operation("todos", "Query", async { Ok(3) }).await;
        assert_eq!(ok, Ok(3));

        let err: Result<u32, String> =
            trace_store_operation("todos", "PutItem", async { Err("denied".to_string()) }).await;
        assert_eq!(err, Err("denied".to_string()));
    }
}
