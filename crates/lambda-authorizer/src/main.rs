use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use shared::{trace_lambda_handler, AuthConfig, TokenVerifier, TrustedKeyStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 検証失敗時の principalId
const DENIED_PRINCIPAL: &str = "user";

/// API Gateway TOKEN オーソライザーのイベント
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizerRequest {
    #[serde(rename = "type")]
    request_type: String,
    authorization_token: Option<String>,
    method_arn: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizerResponse {
    principal_id: String,
    policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    context: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyDocument {
    version: String,
    statement: Vec<Statement>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Statement {
    action: String,
    effect: String,
    resource: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Allow,
    Deny,
}

impl Effect {
    fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

/// Lambda Authorizer のメイン関数
async fn function_handler(
    verifier: &TokenVerifier,
    event: LambdaEvent<AuthorizerRequest>,
) -> Result<AuthorizerResponse, Error> {
    let (request, context) = event.into_parts();

    trace_lambda_handler!("lambda-authorizer", context, async {
        Ok::<_, Error>(authorize(verifier, &request).await)
    })
}

/// トークンを検証して Allow / Deny のポリシーを返す
///
/// 検証失敗はエラーではなく Deny として扱う。
async fn authorize(verifier: &TokenVerifier, request: &AuthorizerRequest) -> AuthorizerResponse {
    info!(
        request_type = %request.request_type,
        method_arn = %request.method_arn,
        "認証リクエストを処理中"
    );

    match verifier.verify(request.authorization_token.as_deref()).await {
        Ok(claims) => {
            info!(user_id = %claims.sub, "ユーザーを認証しました");

            let mut context = HashMap::new();
            context.insert("userId".to_string(), claims.sub.clone());

            AuthorizerResponse {
                principal_id: claims.sub,
                policy_document: generate_policy(Effect::Allow),
                context,
            }
        }
        Err(e) => {
            warn!(error = %e, "ユーザーは認証されませんでした");

            AuthorizerResponse {
                principal_id: DENIED_PRINCIPAL.to_string(),
                policy_document: generate_policy(Effect::Deny),
                context: HashMap::new(),
            }
        }
    }
}

/// IAM ポリシードキュメントを生成
fn generate_policy(effect: Effect) -> PolicyDocument {
    PolicyDocument {
        version: "2012-10-17".to_string(),
        statement: vec![Statement {
            action: "execute-api:Invoke".to_string(),
            effect: effect.as_str().to_string(),
            resource: "*".to_string(),
        }],
    }
}

/// 鍵セットを読み込む
///
/// 失敗しても起動は継続し、空の鍵セットですべてのトークンを拒否する。
async fn load_key_store(config: &AuthConfig) -> TrustedKeyStore {
    match TrustedKeyStore::load(config.key_source.clone(), config.reload_interval).await {
        Ok(keys) => keys,
        Err(e) => {
            error!(error = %e, "署名鍵セットの読み込みに失敗。空の鍵セットで起動します");
            TrustedKeyStore::unloaded(config.key_source.clone(), config.reload_interval)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    if let Err(e) = shared::init_tracing() {
        eprintln!("トレーシング初期化エラー: {e}");
    }

    info!("Lambda Authorizer を開始中...");

    let config = AuthConfig::from_env().map_err(|e| {
        error!("設定読み込みエラー: {}", e);
        Error::from(e.to_string())
    })?;

    // 鍵セットはコンテナ内の呼び出し間で共有する
    let keys = load_key_store(&config).await;
    let verifier = TokenVerifier::from_config(Arc::new(keys), &config);

    let verifier = &verifier;
    run(service_fn(move |event| async move {
        function_handler(verifier, event).await
    }))
    .await
}
