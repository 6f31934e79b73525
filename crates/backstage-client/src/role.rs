use std::future::Future;

use tracing::{debug, error};
use uuid::Uuid;

use backstage_types::models::Role;

use crate::api::ApiClient;
use crate::error::ClientResult;
use crate::session::Identity;

/// Server-side admin check for the current token.
pub trait AdminCheck: Sync {
    fn check_admin(&self) -> impl Future<Output = ClientResult<bool>> + Send;
}

impl AdminCheck for ApiClient {
    async fn check_admin(&self) -> ClientResult<bool> {
        self.is_admin().await
    }
}

/// Resolves an identity to its [`Role`], asking the server at most once per
/// identity. Failures resolve to [`Role::Client`] and are cached like any
/// other answer until the identity changes or [`Self::invalidate`] is
/// called.
#[derive(Debug, Default)]
pub struct RoleResolver {
    cached: Option<(Uuid, Role)>,
}

impl RoleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, identity: &Identity) -> Option<Role> {
        self.cached
            .filter(|(user_id, _)| *user_id == identity.user_id)
            .map(|(_, role)| role)
    }

    pub async fn resolve<C: AdminCheck>(&mut self, checker: &C, identity: Option<&Identity>) -> Role {
        let Some(identity) = identity else {
            self.cached = None;
            return Role::Client;
        };
        if let Some(role) = self.cached(identity) {
            return role;
        }

        let role = match checker.check_admin().await {
            Ok(true) => Role::Admin,
            Ok(false) => Role::Client,
            Err(e) => {
                error!("Admin check for {} failed: {}", identity.user_id, e);
                Role::Client
            }
        };
        debug!("{} resolved as {}", identity.user_id, role);
        self.cached = Some((identity.user_id, role));
        role
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ClientError;

    struct FakeCheck {
        answer: Option<bool>,
        calls: AtomicUsize,
    }

    impl FakeCheck {
        fn new(answer: Option<bool>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl AdminCheck for FakeCheck {
        async fn check_admin(&self) -> ClientResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.ok_or(ClientError::Api {
                status: 500,
                message: "profile lookup failed".into(),
            })
        }
    }

    fn identity(n: u128) -> Identity {
        Identity {
            user_id: Uuid::from_u128(n),
            email: format!("user{n}@example.com"),
        }
    }

    #[tokio::test]
    async fn caches_per_identity() {
        let check = FakeCheck::new(Some(true));
        let mut resolver = RoleResolver::new();

        assert_eq!(resolver.resolve(&check, Some(&identity(1))).await, Role::Admin);
        assert_eq!(resolver.resolve(&check, Some(&identity(1))).await, Role::Admin);
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);

        resolver.resolve(&check, Some(&identity(2))).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached(&identity(1)), None);
    }

    #[tokio::test]
    async fn errors_fail_closed() {
        let check = FakeCheck::new(None);
        let mut resolver = RoleResolver::new();
        assert_eq!(resolver.resolve(&check, Some(&identity(1))).await, Role::Client);

        resolver.invalidate();
        resolver.resolve(&check, Some(&identity(1))).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_identity_is_a_client_without_a_call() {
        let check = FakeCheck::new(Some(true));
        let mut resolver = RoleResolver::new();
        assert_eq!(resolver.resolve(&check, None).await, Role::Client);
        assert_eq!(check.calls.load(Ordering::SeqCst), 0);
    }
}
