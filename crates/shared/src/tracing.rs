use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// トレーシングサブスクライバーを初期化
///
/// `RUST_LOG` が未設定の場合は `info` レベルで出力する。
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 構造化ログ出力でCloudWatchに送信
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time() // CloudWatch がタイムスタンプを付与する
                .json(),
        )
        .with(filter)
        .try_init()?;

    Ok(())
}
