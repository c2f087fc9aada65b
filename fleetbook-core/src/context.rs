use std::future::Future;

use fleetbook_shared::Masked;
use tokio_util::sync::CancellationToken;

use crate::{CoreError, CoreResult};

/// Supplies the bearer credential for outbound calls. Credential lifecycle
/// (login, refresh, storage) belongs to the implementor, never to the engine.
pub trait CredentialProvider: Send + Sync {
    fn bearer(&self) -> CoreResult<Masked<String>>;
}

/// Fixed credential, e.g. a service token from configuration
#[derive(Clone)]
pub struct StaticCredential {
    token: Masked<String>,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: Masked(token.into()) }
    }
}

impl CredentialProvider for StaticCredential {
    fn bearer(&self) -> CoreResult<Masked<String>> {
        if self.token.expose().trim().is_empty() {
            return Err(CoreError::AuthExpired);
        }
        Ok(self.token.clone())
    }
}

/// Everything a remote call needs: who is calling and whether the caller still cares.
#[derive(Clone, Debug)]
pub struct CallContext {
    pub credential: Masked<String>,
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new(credential: Masked<String>, cancel: CancellationToken) -> Self {
        Self { credential, cancel }
    }

    pub fn from_provider(provider: &dyn CredentialProvider, cancel: CancellationToken) -> CoreResult<Self> {
        Ok(Self::new(provider.bearer()?, cancel))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Race a remote call against this context's cancellation token.
    pub async fn guard<F, T>(&self, call: F) -> CoreResult<T>
    where
        F: Future<Output = CoreResult<T>>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CoreError::Cancelled),
            result = call => result,
        }
    }
}
