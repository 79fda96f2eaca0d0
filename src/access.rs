//! Command-channel access control.
//!
//! A caller may use a gated command if it is the admin or has been granted
//! access. The admin id is read from the store (key `admin`) and falls back
//! to the configured `ADMIN_ID`; grants live in the store set `user`.
//!
//! Denials carry a fixed operator-facing message and never mutate state. A
//! store error during the check is treated as a denial.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{self, KvStore, StoreError, keys};
use crate::types::PrincipalId;

/// Reply sent to callers who fail the access check.
pub const DENIAL_MESSAGE: &str =
    "You are not allowed to use this command. Please contact the administrator.";

/// The caller failed the access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", DENIAL_MESSAGE)]
pub struct AccessDenied {
    pub caller: PrincipalId,
}

/// Who is allowed to issue control commands.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// The admin principal, if one is configured.
    async fn admin_id(&self) -> store::Result<Option<PrincipalId>>;

    /// Whether `id` has been granted access.
    async fn is_member(&self, id: PrincipalId) -> store::Result<bool>;

    /// Grants access to `ids`. Returns how many were newly granted.
    async fn grant(&self, ids: &[PrincipalId]) -> store::Result<usize>;
}

/// [`AccessPolicy`] backed by the shared store.
pub struct StoreAccessPolicy {
    store: Arc<dyn KvStore>,
    fallback_admin: Option<PrincipalId>,
}

impl StoreAccessPolicy {
    pub fn new(store: Arc<dyn KvStore>, fallback_admin: Option<PrincipalId>) -> Self {
        StoreAccessPolicy {
            store,
            fallback_admin,
        }
    }
}

#[async_trait]
impl AccessPolicy for StoreAccessPolicy {
    async fn admin_id(&self) -> store::Result<Option<PrincipalId>> {
        let stored = self.store.get(keys::ADMIN).await?;
        match stored.as_deref().map(str::parse::<PrincipalId>) {
            Some(Ok(id)) => Ok(Some(id)),
            Some(Err(_)) => {
                warn!(value = ?stored, "Stored admin id is not numeric, using configured admin");
                Ok(self.fallback_admin)
            }
            None => Ok(self.fallback_admin),
        }
    }

    async fn is_member(&self, id: PrincipalId) -> store::Result<bool> {
        self.store.is_member(keys::USER, &id.to_string()).await
    }

    async fn grant(&self, ids: &[PrincipalId]) -> store::Result<usize> {
        let members: Vec<String> = ids.iter().map(ToString::to_string).collect();
        self.store.set_add(keys::USER, &members).await
    }
}

/// Evaluates an [`AccessPolicy`] for a caller.
#[derive(Clone)]
pub struct AccessGate {
    policy: Arc<dyn AccessPolicy>,
}

impl AccessGate {
    pub fn new(policy: Arc<dyn AccessPolicy>) -> Self {
        AccessGate { policy }
    }

    /// Allows the admin and granted members; denies everyone else.
    pub async fn check(&self, caller: PrincipalId) -> Result<(), AccessDenied> {
        match self.evaluate(caller).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(%caller, "Access denied");
                Err(AccessDenied { caller })
            }
            Err(e) => {
                warn!(%caller, error = %e, "Access check failed, denying");
                Err(AccessDenied { caller })
            }
        }
    }

    async fn evaluate(&self, caller: PrincipalId) -> Result<bool, StoreError> {
        if self.policy.admin_id().await? == Some(caller) {
            return Ok(true);
        }
        self.policy.is_member(caller).await
    }
}
