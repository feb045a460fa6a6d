use async_trait::async_trait;
use roulette_core::PeerId;

use crate::error::SessionError;

/// Anonymous sign-in against the external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<PeerId, SessionError>;
}

/// Mints a random peer id locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousIdentityProvider;

#[async_trait]
impl IdentityProvider for AnonymousIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<PeerId, SessionError> {
        Ok(PeerId::new())
    }
}
