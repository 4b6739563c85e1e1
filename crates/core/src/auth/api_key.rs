//! Operator key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Grants the operator capability to callers presenting the configured key.
///
/// The key may arrive as `Authorization: Bearer <key>` (scheme is
/// case-insensitive) or as `X-API-Key: <key>`. Callers without any key are
/// reported as `NoCredentials`, which [`Authenticator::resolve`] turns into
/// an anonymous customer.
pub struct ApiKeyAuthenticator {
    operator_key: String,
}

impl ApiKeyAuthenticator {
    pub fn new(operator_key: String) -> Self {
        Self { operator_key }
    }

    fn presented_key(request: &AuthRequest) -> Option<&str> {
        let bearer = request.headers.get("authorization").and_then(|value| {
            let (scheme, key) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| key.trim())
        });

        bearer.or_else(|| request.headers.get("x-api-key").map(|key| key.trim()))
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let presented = Self::presented_key(request).ok_or(AuthError::NoCredentials)?;

        if constant_time_eq(presented.as_bytes(), self.operator_key.as_bytes()) {
            Ok(Identity::operator("operator", "api_key"))
        } else {
            Err(AuthError::Rejected("Invalid operator key".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn make_request(headers: Vec<(&str, &str)>) -> AuthRequest {
        AuthRequest {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_bearer_key_grants_operator() {
        let auth = ApiKeyAuthenticator::new("desk-key-123".to_string());
        let request = make_request(vec![("Authorization", "Bearer desk-key-123")]);

        let identity = auth.authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id, "operator");
        assert_eq!(identity.method, "api_key");
        assert!(identity.is_operator());
    }

    #[tokio::test]
    async fn test_x_api_key_header_grants_operator() {
        let auth = ApiKeyAuthenticator::new("desk-key-123".to_string());
        let request = make_request(vec![("X-API-Key", "desk-key-123")]);

        let identity = auth.authenticate(&request).await.unwrap();
        assert!(identity.is_operator());
    }

    #[tokio::test]
    async fn test_bearer_scheme_case_insensitive() {
        let auth = ApiKeyAuthenticator::new("desk-key-123".to_string());
        let request = make_request(vec![("Authorization", "bearer desk-key-123")]);

        assert!(auth.authenticate(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let auth = ApiKeyAuthenticator::new("desk-key-123".to_string());
        let request = make_request(vec![("Authorization", "Bearer nope")]);

        let result = auth.authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_no_key_presents_no_credentials() {
        let auth = ApiKeyAuthenticator::new("desk-key-123".to_string());

        let result = auth.authenticate(&make_request(vec![])).await;
        assert!(matches!(result, Err(AuthError::NoCredentials)));
    }

    #[tokio::test]
    async fn test_other_authorization_scheme_ignored() {
        let auth = ApiKeyAuthenticator::new("desk-key-123".to_string());
        let request = make_request(vec![("Authorization", "Basic desk-key-123")]);

        let result = auth.authenticate(&request).await;
        assert!(matches!(result, Err(AuthError::NoCredentials)));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"hello", b"hell"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
