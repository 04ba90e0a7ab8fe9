//! JWT 认证策略
//!
//! HS256 对称密钥校验，解码后的 claims 交给调用方的 [`TokenValidator`]
//! 做业务校验 (用户是否存在、是否被禁用等)。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::Value;

use super::middleware::{AuthRejection, AuthStrategy, Credentials};
use crate::engine::RequestSummary;

/// Strategy name under which the JWT strategy is registered.
pub const JWT_STRATEGY: &str = "jwt";

/// 业务校验结果
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Replaces the decoded claims as request credentials when set.
    pub credentials: Option<Value>,
}

impl ValidationOutcome {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            credentials: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Caller-supplied validation of decoded claims.
#[async_trait]
pub trait TokenValidator: Send + Sync + fmt::Debug {
    async fn validate(&self, claims: &Value, request: &RequestSummary) -> ValidationOutcome;
}

/// Default validator: every correctly signed token is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl TokenValidator for AcceptAll {
    async fn validate(&self, _claims: &Value, _request: &RequestSummary) -> ValidationOutcome {
        ValidationOutcome::valid()
    }
}

/// Closure adapter, see [`validate_with`].
pub struct FnValidator<F> {
    f: F,
}

impl<F> fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValidator").finish_non_exhaustive()
    }
}

/// Build a [`TokenValidator`] from an async closure.
///
/// ```ignore
/// let validator = validate_with(|claims, _req| async move {
///     if claims["sub"] == "admin@example.com" {
///         ValidationOutcome::valid()
///     } else {
///         ValidationOutcome::invalid()
///     }
/// });
/// ```
pub fn validate_with<F, Fut>(f: F) -> FnValidator<F>
where
    F: Fn(Value, RequestSummary) -> Fut + Send + Sync,
    Fut: Future<Output = ValidationOutcome> + Send,
{
    FnValidator { f }
}

#[async_trait]
impl<F, Fut> TokenValidator for FnValidator<F>
where
    F: Fn(Value, RequestSummary) -> Fut + Send + Sync,
    Fut: Future<Output = ValidationOutcome> + Send,
{
    async fn validate(&self, claims: &Value, request: &RequestSummary) -> ValidationOutcome {
        (self.f)(claims.clone(), request.clone()).await
    }
}

/// JWT 令牌策略
///
/// - 仅接受 HS256
/// - 不强制任何注册声明；`exp` 存在时校验过期
/// - 不校验 `aud`
/// - 令牌来自 `Authorization` 头，可带或不带 `Bearer ` 前缀
pub struct JwtStrategy {
    decoding_key: DecodingKey,
    validation: Validation,
    validator: Arc<dyn TokenValidator>,
}

impl fmt::Debug for JwtStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtStrategy")
            .field("algorithms", &self.validation.algorithms)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl JwtStrategy {
    pub fn new(secret: &str, validator: Arc<dyn TokenValidator>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            validator,
        }
    }

    /// 从 Authorization 头提取令牌
    ///
    /// `Bearer` 前缀可选且不区分大小写；只有前缀没有值视为缺失。
    pub fn extract_from_header(header: &str) -> Option<&str> {
        const SCHEME: &str = "bearer";

        let header = header.trim_start();
        let token = match header.get(..SCHEME.len()) {
            Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => {
                let rest = &header[SCHEME.len()..];
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    rest
                } else {
                    header
                }
            }
            _ => header,
        }
        .trim();
        (!token.is_empty()).then_some(token)
    }

    /// 验证并解码令牌
    pub fn decode_token(&self, token: &str) -> Result<Value, AuthRejection> {
        decode::<Value>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthRejection::ExpiredToken,
                _ => AuthRejection::InvalidToken(e.to_string()),
            })
    }
}

#[async_trait]
impl AuthStrategy for JwtStrategy {
    fn scheme(&self) -> &str {
        JWT_STRATEGY
    }

    async fn authenticate(&self, parts: &Parts) -> Result<Credentials, AuthRejection> {
        let token = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(Self::extract_from_header)
            .ok_or(AuthRejection::MissingToken)?;

        let claims = self.decode_token(token)?;

        let request = RequestSummary::from_parts(parts);
        let outcome = self.validator.validate(&claims, &request).await;
        if !outcome.is_valid {
            return Err(AuthRejection::InvalidCredentials);
        }

        Ok(Credentials {
            scheme: JWT_STRATEGY.to_string(),
            value: outcome.credentials.unwrap_or(claims),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "6ba6161c-62e9-4cd7-9f6e-c6f6bf88557d";

    fn sign(claims: &Value, secret: &str, alg: Algorithm) -> String {
        encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("Failed to sign test token")
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = http::Request::builder().uri("/orders");
        if let Some(value) = auth {
            builder = builder.header(http::header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn claims() -> Value {
        json!({
            "iss": "Online JWT Builder",
            "aud": "www.example.com",
            "sub": "test@example.com",
            "Role": ["Manager", "Project Administrator"]
        })
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(JwtStrategy::extract_from_header("Bearer abc"), Some("abc"));
        assert_eq!(JwtStrategy::extract_from_header("abc"), Some("abc"));
        assert_eq!(JwtStrategy::extract_from_header("Bearer "), None);
        assert_eq!(JwtStrategy::extract_from_header("Bearer"), None);
        assert_eq!(JwtStrategy::extract_from_header(""), None);
    }

    #[test]
    fn test_extract_from_header_scheme_is_case_insensitive() {
        assert_eq!(JwtStrategy::extract_from_header("bearer abc"), Some("abc"));
        assert_eq!(JwtStrategy::extract_from_header("BEARER  abc "), Some("abc"));
        assert_eq!(JwtStrategy::extract_from_header("  Bearer\tabc"), Some("abc"));
        // not a scheme prefix, the whole value is the token
        assert_eq!(JwtStrategy::extract_from_header("Bearerabc"), Some("Bearerabc"));
    }

    #[tokio::test]
    async fn test_empty_bearer_value_is_missing_token() {
        let strategy = JwtStrategy::new(SECRET, Arc::new(AcceptAll));

        for value in ["Bearer", "Bearer ", "bearer   "] {
            let err = strategy
                .authenticate(&parts_with(Some(value)))
                .await
                .unwrap_err();
            assert_eq!(err, AuthRejection::MissingToken, "{value:?}");
        }
    }

    #[tokio::test]
    async fn test_token_without_exp_or_audience_check_is_accepted() {
        let strategy = JwtStrategy::new(SECRET, Arc::new(AcceptAll));
        let token = sign(&claims(), SECRET, Algorithm::HS256);

        let credentials = strategy
            .authenticate(&parts_with(Some(&token)))
            .await
            .expect("token should be accepted");

        assert_eq!(credentials.scheme, "jwt");
        assert_eq!(credentials.value["sub"], "test@example.com");
    }

    #[tokio::test]
    async fn test_bearer_prefix_is_optional() {
        let strategy = JwtStrategy::new(SECRET, Arc::new(AcceptAll));
        let token = sign(&claims(), SECRET, Algorithm::HS256);

        assert!(
            strategy
                .authenticate(&parts_with(Some(&format!("Bearer {token}"))))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_missing_and_forged_tokens() {
        let strategy = JwtStrategy::new(SECRET, Arc::new(AcceptAll));

        let err = strategy.authenticate(&parts_with(None)).await.unwrap_err();
        assert_eq!(err, AuthRejection::MissingToken);

        let forged = sign(&claims(), "another-secret", Algorithm::HS256);
        let err = strategy
            .authenticate(&parts_with(Some(&forged)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthRejection::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_only_hs256_is_allowed() {
        let strategy = JwtStrategy::new(SECRET, Arc::new(AcceptAll));
        let token = sign(&claims(), SECRET, Algorithm::HS384);

        let err = strategy
            .authenticate(&parts_with(Some(&token)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthRejection::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let strategy = JwtStrategy::new(SECRET, Arc::new(AcceptAll));
        let token = sign(
            &json!({ "sub": "old", "exp": 1_000_000_000 }),
            SECRET,
            Algorithm::HS256,
        );

        let err = strategy
            .authenticate(&parts_with(Some(&token)))
            .await
            .unwrap_err();
        assert_eq!(err, AuthRejection::ExpiredToken);
    }

    #[tokio::test]
    async fn test_validator_decides_and_may_replace_credentials() {
        let validator = validate_with(|claims: Value, request: RequestSummary| async move {
            if claims["sub"] == "test@example.com" && request.path == "/orders" {
                ValidationOutcome::valid().with_credentials(json!({ "user": "johnny" }))
            } else {
                ValidationOutcome::invalid()
            }
        });
        let strategy = JwtStrategy::new(SECRET, Arc::new(validator));

        let token = sign(&claims(), SECRET, Algorithm::HS256);
        let credentials = strategy
            .authenticate(&parts_with(Some(&token)))
            .await
            .unwrap();
        assert_eq!(credentials.value, json!({ "user": "johnny" }));

        let stranger = sign(&json!({ "sub": "nobody" }), SECRET, Algorithm::HS256);
        let err = strategy
            .authenticate(&parts_with(Some(&stranger)))
            .await
            .unwrap_err();
        assert_eq!(err, AuthRejection::InvalidCredentials);
    }
}
