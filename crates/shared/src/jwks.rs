//! 信頼する署名鍵セット（JWKS）の読み込みとローテーション
//!
//! 鍵セットは設定（インライン JSON またはファイル）から供給される。
//! 再読み込み間隔が設定されている場合、間隔経過後の最初の検証時に
//! ソースから読み直す。読み直しに失敗した場合は直前の鍵を使い続ける。

use crate::auth::AuthError;
use jsonwebtoken::jwk::{AlgorithmParameters, JwkSet, KeyAlgorithm};
use jsonwebtoken::DecodingKey;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// 鍵セットの供給元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// JWKS JSON 文字列
    Inline(String),
    /// JWKS JSON ファイル
    File(PathBuf),
}

impl KeySource {
    async fn read(&self) -> Result<String, AuthError> {
        match self {
            KeySource::Inline(json) => Ok(json.clone()),
            KeySource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                AuthError::KeySet(format!("{} を読み込めません: {e}", path.display()))
            }),
        }
    }
}

/// 検証に使う公開鍵
#[derive(Clone)]
pub struct TrustedKey {
    kid: Option<String>,
    key: DecodingKey,
}

impl TrustedKey {
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedKey").field("kid", &self.kid).finish()
    }
}

/// 信頼する公開鍵の集合
#[derive(Debug, Clone, Default)]
pub struct TrustedKeySet {
    keys: Vec<TrustedKey>,
}

impl TrustedKeySet {
    /// JWKS JSON から RS256 用の RSA 鍵だけを取り出す
    pub fn from_jwks_json(json: &str) -> Result<Self, AuthError> {
        let jwks: JwkSet = serde_json::from_str(json)
            .map_err(|e| AuthError::KeySet(format!("JWKS の形式が不正です: {e}")))?;

        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in &jwks.keys {
            let kid = jwk.common.key_id.clone();

            if matches!(jwk.common.key_algorithm, Some(ref alg) if *alg != KeyAlgorithm::RS256) {
                debug!(kid = ?kid, "RS256 以外の鍵をスキップ");
                continue;
            }

            let AlgorithmParameters::RSA(rsa) = &jwk.algorithm else {
                debug!(kid = ?kid, "RSA 以外の鍵をスキップ");
                continue;
            };

            match DecodingKey::from_rsa_components(&rsa.n, &rsa.e) {
                Ok(key) => keys.push(TrustedKey { kid, key }),
                Err(e) => warn!(kid = ?kid, error = %e, "RSA 鍵を構築できないためスキップ"),
            }
        }

        Ok(Self { keys })
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `kid` が一致する鍵、なければ先頭の鍵を返す
    pub fn select(&self, kid: Option<&str>) -> Option<&TrustedKey> {
        kid.and_then(|kid| self.keys.iter().find(|k| k.kid() == Some(kid)))
            .or_else(|| self.keys.first())
    }
}

struct LoadedKeys {
    keys: Arc<TrustedKeySet>,
    loaded_at: Instant,
}

/// 鍵セットのキャッシュ
///
/// Lambda コンテナ内でハンドラー呼び出しをまたいで共有される。
pub struct TrustedKeyStore {
    source: Option<KeySource>,
    reload_interval: Option<Duration>,
    state: RwLock<LoadedKeys>,
}

impl TrustedKeyStore {
    /// ソースから鍵セットを読み込んでストアを作成
    ///
    /// `source` が `None` の場合は空の鍵セットになる。
    pub async fn load(
        source: Option<KeySource>,
        reload_interval: Option<Duration>,
    ) -> Result<Self, AuthError> {
        let keys = match &source {
            Some(source) => TrustedKeySet::from_jwks_json(&source.read().await?)?,
            None => {
                warn!("信頼する署名鍵が設定されていません。すべてのトークンが拒否されます");
                TrustedKeySet::default()
            }
        };
        info!(key_count = keys.len(), "署名鍵セットを読み込みました");

        Ok(Self {
            source,
            reload_interval,
            state: RwLock::new(LoadedKeys {
                keys: Arc::new(keys),
                loaded_at: Instant::now(),
            }),
        })
    }

    /// 空の鍵セットでストアを作成
    ///
    /// 初回読み込みに失敗した場合に使う。`source` と `reload_interval` が
    /// あれば、間隔経過後の検証時に読み直す。
    pub fn unloaded(source: Option<KeySource>, reload_interval: Option<Duration>) -> Self {
        Self {
            source,
            reload_interval,
            state: RwLock::new(LoadedKeys {
                keys: Arc::new(TrustedKeySet::default()),
                loaded_at: Instant::now(),
            }),
        }
    }

    /// 固定の鍵セットでストアを作成（再読み込みなし）
    pub fn from_key_set(keys: TrustedKeySet) -> Self {
        Self {
            source: None,
            reload_interval: None,
            state: RwLock::new(LoadedKeys {
                keys: Arc::new(keys),
                loaded_at: Instant::now(),
            }),
        }
    }

    /// 現在の鍵セットを取得（再読み込み間隔を過ぎていれば読み直す）
    pub async fn current(&self) -> Arc<TrustedKeySet> {
        if self.reload_due().await {
            if let Err(e) = self.reload().await {
                warn!(error = %e, "署名鍵セットの再読み込みに失敗。既存の鍵を使用します");
            }
        }
        self.state.read().await.keys.clone()
    }

    /// ソースから鍵セットを読み直す
    pub async fn reload(&self) -> Result<(), AuthError> {
        let Some(source) = &self.source else {
            return Ok(());
        };

        let result = match source.read().await {
            Ok(json) => TrustedKeySet::from_jwks_json(&json),
            Err(e) => Err(e),
        };

        let mut state = self.state.write().await;
        // 失敗時も次の再試行は次の間隔まで待つ
        state.loaded_at = Instant::now();
        let keys = result?;
        info!(key_count = keys.len(), "署名鍵セットを再読み込みしました");
        state.keys = Arc::new(keys);
        Ok(())
    }

    async fn reload_due(&self) -> bool {
        match (&self.source, self.reload_interval) {
            (Some(_), Some(interval)) => self.state.read().await.loaded_at.elapsed() >= interval,
            _ => false,
        }
    }
}
