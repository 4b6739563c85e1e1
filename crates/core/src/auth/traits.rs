//! The seam between presented credentials and the operator capability.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{AuthRequest, Identity};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Nothing was presented. Customers never present anything.
    #[error("No operator credentials presented")]
    NoCredentials,

    #[error("Operator credentials rejected: {0}")]
    Rejected(String),

    #[error("Authenticator misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Check the operator credentials carried by `request`.
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;

    /// Who is calling: the operator, or an anonymous customer when nothing
    /// was presented. Only credentials that were presented and rejected fail.
    async fn resolve(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        match self.authenticate(request).await {
            Err(AuthError::NoCredentials) => Ok(Identity::anonymous()),
            other => other,
        }
    }
}
