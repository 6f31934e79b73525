//! Session/identity manager: the current identity, a loading flag, the
//! transient notices shown while authentication is checked, and the route
//! guard that keeps signed-out users on `/login`.

use std::future::Future;

use tokio::sync::watch;
use tracing::{debug, warn};

use backstage_types::api::MeResponse;

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::routes::Route;

/// The signed-in user as reported by `/auth/me`.
pub type Identity = MeResponse;

pub const CHECKING_AUTH: &str = "Checking authentication...";

/// Where identities come from. [`ApiClient`] is the real source; tests
/// substitute fakes.
pub trait IdentitySource: Send {
    fn has_token(&self) -> bool;

    fn fetch_identity(&self) -> impl Future<Output = ClientResult<Identity>> + Send;

    fn sign_in(&mut self, email: &str, password: &str) -> impl Future<Output = ClientResult<Identity>> + Send;

    fn refresh(&mut self) -> impl Future<Output = ClientResult<Identity>> + Send;

    fn sign_out(&mut self);
}

impl IdentitySource for ApiClient {
    fn has_token(&self) -> bool {
        self.token().is_some()
    }

    async fn fetch_identity(&self) -> ClientResult<Identity> {
        self.me().await
    }

    async fn sign_in(&mut self, email: &str, password: &str) -> ClientResult<Identity> {
        let auth = self.login(email, password).await?;
        Ok(Identity {
            user_id: auth.user_id,
            email: auth.email,
        })
    }

    async fn refresh(&mut self) -> ClientResult<Identity> {
        let auth = ApiClient::refresh(self).await?;
        Ok(Identity {
            user_id: auth.user_id,
            email: auth.email,
        })
    }

    fn sign_out(&mut self) {
        self.logout();
    }
}

/// Identity-change notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn(Identity),
    TokenRefreshed(Identity),
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

/// What observers see after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub loading: bool,
    pub route: Route,
}

pub struct SessionManager<S> {
    source: S,
    identity: Option<Identity>,
    loading: bool,
    route: Route,
    notices: Vec<Notice>,
    next_notice: u64,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl<S: IdentitySource> SessionManager<S> {
    /// Starts in the loading state on `route`; call [`Self::initialize`]
    /// before trusting the identity.
    pub fn new(source: S, route: Route) -> Self {
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            identity: None,
            loading: true,
            route: route.clone(),
        });
        Self {
            source,
            identity: None,
            loading: true,
            route,
            notices: Vec::new(),
            next_notice: 1,
            snapshot_tx,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn dismiss(&mut self, id: u64) {
        self.notices.retain(|n| n.id != id);
    }

    /// Fetch the current identity when a token is held.
    pub async fn initialize(&mut self) {
        let checking = self.begin_check();
        let identity = if self.source.has_token() {
            match self.source.fetch_identity().await {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("Session check failed: {}", e);
                    self.push_notice(NoticeLevel::Error, format!("Could not verify your session: {e}"));
                    None
                }
            }
        } else {
            None
        };
        self.settle(identity);
        self.end_check(checking);
    }

    /// Apply an identity-change notification.
    pub fn apply(&mut self, change: AuthChange) {
        debug!("Applying auth change: {:?}", change);
        let checking = self.begin_check();
        match change {
            AuthChange::SignedIn(identity) | AuthChange::TokenRefreshed(identity) => {
                self.settle(Some(identity));
            }
            AuthChange::SignedOut => {
                self.identity = None;
                self.route = Route::Login;
            }
        }
        self.end_check(checking);
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> ClientResult<()> {
        match self.source.sign_in(email, password).await {
            Ok(identity) => {
                self.apply(AuthChange::SignedIn(identity));
                Ok(())
            }
            Err(e) => {
                self.push_notice(NoticeLevel::Error, e.to_string());
                self.publish();
                Err(e)
            }
        }
    }

    /// A rejected refresh signs the user out; other failures only raise a
    /// notice.
    pub async fn refresh(&mut self) -> ClientResult<()> {
        match self.source.refresh().await {
            Ok(identity) => {
                self.apply(AuthChange::TokenRefreshed(identity));
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                self.source.sign_out();
                self.apply(AuthChange::SignedOut);
                Err(e)
            }
            Err(e) => {
                self.push_notice(NoticeLevel::Error, e.to_string());
                self.publish();
                Err(e)
            }
        }
    }

    pub fn sign_out(&mut self) {
        self.source.sign_out();
        self.apply(AuthChange::SignedOut);
    }

    /// Move to `route`, subject to the guard.
    pub fn navigate(&mut self, route: Route) -> &Route {
        self.route = self.guard(route);
        self.publish();
        &self.route
    }

    /// Signed-out users may only see `/login`. While the session is still
    /// loading the requested route is kept.
    pub fn guard(&self, route: Route) -> Route {
        if self.identity.is_none() && !self.loading && route != Route::Login {
            Route::Login
        } else {
            route
        }
    }

    /// Require a live identity before an authenticated operation.
    pub fn require_identity(&self) -> ClientResult<&Identity> {
        self.identity.as_ref().ok_or(ClientError::Unauthenticated)
    }

    fn settle(&mut self, identity: Option<Identity>) {
        let signed_in = identity.is_some();
        self.identity = identity;
        if signed_in && self.route == Route::Login {
            self.route = Route::Dashboard;
        }
    }

    fn begin_check(&mut self) -> u64 {
        self.loading = true;
        let id = self.push_notice(NoticeLevel::Info, CHECKING_AUTH.to_string());
        self.publish();
        id
    }

    fn end_check(&mut self, notice: u64) {
        self.loading = false;
        self.dismiss(notice);
        self.route = self.guard(self.route.clone());
        self.publish();
    }

    fn push_notice(&mut self, level: NoticeLevel, message: String) -> u64 {
        let id = self.next_notice;
        self.next_notice += 1;
        self.notices.push(Notice { id, level, message });
        id
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            identity: self.identity.clone(),
            loading: self.loading,
            route: self.route.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    struct FakeSource {
        token: bool,
        identity: ClientResult<Identity>,
    }

    fn identity() -> Identity {
        Identity {
            user_id: Uuid::from_u128(7),
            email: "client@example.com".into(),
        }
    }

    fn api_error(status: u16, message: &str) -> ClientError {
        ClientError::Api {
            status,
            message: message.into(),
        }
    }

    fn clone_result(result: &ClientResult<Identity>) -> ClientResult<Identity> {
        match result {
            Ok(identity) => Ok(identity.clone()),
            Err(ClientError::Api { status, message }) => Err(api_error(*status, message)),
            Err(_) => Err(ClientError::Unauthenticated),
        }
    }

    impl IdentitySource for FakeSource {
        fn has_token(&self) -> bool {
            self.token
        }

        async fn fetch_identity(&self) -> ClientResult<Identity> {
            clone_result(&self.identity)
        }

        async fn sign_in(&mut self, _email: &str, _password: &str) -> ClientResult<Identity> {
            let result = clone_result(&self.identity);
            self.token = result.is_ok();
            result
        }

        async fn refresh(&mut self) -> ClientResult<Identity> {
            clone_result(&self.identity)
        }

        fn sign_out(&mut self) {
            self.token = false;
        }
    }

    fn manager(token: bool, identity: ClientResult<Identity>, route: Route) -> SessionManager<FakeSource> {
        SessionManager::new(FakeSource { token, identity }, route)
    }

    #[tokio::test]
    async fn valid_identity_on_login_goes_to_dashboard() {
        let mut session = manager(true, Ok(identity()), Route::Login);
        assert!(session.is_loading());
        session.initialize().await;
        assert!(!session.is_loading());
        assert_eq!(session.identity(), Some(&identity()));
        assert_eq!(session.route(), &Route::Dashboard);
        // the checking notice is gone once settled
        assert!(session.notices().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_is_an_error_notice_and_no_identity() {
        let mut session = manager(true, Err(api_error(500, "boom")), Route::Dashboard);
        session.initialize().await;
        assert!(session.identity().is_none());
        assert!(!session.is_loading());
        assert_eq!(session.route(), &Route::Login);
        assert_eq!(session.notices().len(), 1);
        assert_eq!(session.notices()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn guard_redirects_signed_out_users() {
        let mut session = manager(false, Ok(identity()), Route::Dashboard);
        // still loading: the route is kept
        assert_eq!(session.guard(Route::Admin), Route::Admin);
        session.initialize().await;
        assert_eq!(session.route(), &Route::Login);
        assert_eq!(session.navigate(Route::Profile), &Route::Login);
    }

    #[tokio::test]
    async fn sign_in_then_sign_out() {
        let mut session = manager(false, Ok(identity()), Route::Login);
        session.initialize().await;
        let mut watch = session.watch();

        session.sign_in("client@example.com", "password123").await.unwrap();
        assert_eq!(session.route(), &Route::Dashboard);
        assert!(watch.has_changed().unwrap());
        assert_eq!(watch.borrow_and_update().identity, Some(identity()));

        session.navigate(Route::Profile);
        session.sign_out();
        assert!(session.identity().is_none());
        assert_eq!(session.route(), &Route::Login);
        assert!(!session.source().has_token());
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out() {
        let mut session = manager(true, Ok(identity()), Route::Dashboard);
        session.initialize().await;
        session.source.identity = Err(api_error(401, "Invalid or expired token"));

        assert!(session.refresh().await.is_err());
        assert!(session.identity().is_none());
        assert_eq!(session.route(), &Route::Login);
    }

    #[test]
    fn token_refresh_keeps_the_route() {
        let mut session = manager(true, Ok(identity()), Route::Profile);
        session.apply(AuthChange::TokenRefreshed(identity()));
        assert_eq!(session.route(), &Route::Profile);
        assert!(session.require_identity().is_ok());
    }
}
