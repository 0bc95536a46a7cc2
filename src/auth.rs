//! Authentication capability seam.
//!
//! Identity verification is an external collaborator: the gateway consumes
//! `authenticate(credential) -> CallerId` and uses the resulting id only as
//! a partition key. [`TokenMapAuthenticator`] is the shipped config-driven
//! implementation for deployments fronted by a real identity provider that
//! issues opaque service credentials, and for tests.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::config::AuthConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::models::CallerId;

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolve an opaque credential to a caller identity.
    async fn authenticate(&self, credential: &str) -> GatewayResult<CallerId>;
}

/// Static credential → caller-id map from configuration.
pub struct TokenMapAuthenticator {
    tokens: HashMap<String, CallerId>,
}

impl TokenMapAuthenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            tokens: config
                .tokens
                .iter()
                .map(|(token, caller)| (token.clone(), CallerId::new(caller.clone())))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for TokenMapAuthenticator {
    async fn authenticate(&self, credential: &str) -> GatewayResult<CallerId> {
        self.tokens
            .get(credential)
            .cloned()
            .ok_or_else(|| GatewayError::Auth("unknown credential".to_string()))
    }
}
