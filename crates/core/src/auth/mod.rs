//! Who may move the queue.
//!
//! Anyone may take a ticket. Advancing and resetting need the operator
//! capability, which an [`Authenticator`] grants from what the request
//! presents.

mod api_key;
mod none;
mod traits;
mod types;

pub use api_key::*;
pub use none::*;
pub use traits::*;
pub use types::*;

use crate::config::{AuthConfig, AuthMethod};

/// Build the authenticator selected in config.
///
/// - `none`: every caller holds the operator capability.
/// - `api_key`: only callers presenting the configured key do; callers
///   presenting nothing are customers.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            let operator_key = config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .ok_or_else(|| {
                    AuthError::Misconfigured(
                        "api_key auth needs a non-empty operator key".to_string(),
                    )
                })?;
            Ok(Box::new(ApiKeyAuthenticator::new(operator_key)))
        }
    }
}
