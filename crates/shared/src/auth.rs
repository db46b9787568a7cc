use crate::config::AuthConfig;
use crate::jwks::TrustedKeyStore;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const BEARER_PREFIX: &str = "bearer ";

/// 検証済み JWT のクレーム
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtPayload {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// 文字列または文字列配列
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No authentication header")]
    MissingHeader,

    #[error("Invalid authentication header")]
    MalformedHeader,

    #[error("No signing certificate available")]
    CertificateUnavailable,

    #[error("Invalid token: {0}")]
    SignatureInvalid(String),

    #[error("Signing key set unavailable: {0}")]
    KeySet(String),
}

/// `Authorization` ヘッダーからトークン部分を取り出す
///
/// プレフィックスは大文字小文字を区別しない。トークンは空白区切りの 2 番目の要素。
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let header = authorization.ok_or(AuthError::MissingHeader)?;

    let has_prefix = header
        .get(..BEARER_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BEARER_PREFIX));
    if !has_prefix {
        return Err(AuthError::MalformedHeader);
    }

    header
        .split_whitespace()
        .nth(1)
        .ok_or(AuthError::MalformedHeader)
}

/// RS256 の JWT 検証器
pub struct TokenVerifier {
    keys: Arc<TrustedKeyStore>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(keys: Arc<TrustedKeyStore>) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        // exp は存在する場合のみ検証する
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self { keys, validation }
    }

    pub fn from_config(keys: Arc<TrustedKeyStore>, config: &AuthConfig) -> Self {
        let mut verifier = Self::new(keys);
        if let Some(audience) = &config.audience {
            verifier = verifier.with_audience(audience);
        }
        if let Some(issuer) = &config.issuer {
            verifier = verifier.with_issuer(issuer);
        }
        verifier
    }

    /// `aud` を必須にして指定値と照合する
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self.validation
            .required_spec_claims
            .insert("aud".to_string());
        self
    }

    /// `iss` を必須にして指定値と照合する
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self.validation
            .required_spec_claims
            .insert("iss".to_string());
        self
    }

    /// `Authorization` ヘッダーを検証してクレームを返す
    pub async fn verify(&self, authorization: Option<&str>) -> Result<JwtPayload, AuthError> {
        let token = extract_bearer_token(authorization)?;

        let keys = self.keys.current().await;
        if keys.is_empty() {
            return Err(AuthError::CertificateUnavailable);
        }

        let header =
            decode_header(token).map_err(|e| AuthError::SignatureInvalid(e.to_string()))?;
        let key = keys
            .select(header.kid.as_deref())
            .ok_or(AuthError::CertificateUnavailable)?;
        debug!(kid = ?key.kid(), "署名鍵を選択しました");

        let data = decode::<JwtPayload>(token, key.decoding_key(), &self.validation)
            .map_err(|e| AuthError::SignatureInvalid(e.to_string()))?;

        Ok(data.claims)
    }
}
