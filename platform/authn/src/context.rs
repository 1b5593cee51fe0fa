use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::{AuthProvider, AuthnResult, LoginCredentials, SignUpCredentials, User};

/// Client-side owner of the signed-in user.
///
/// Every change is published on a watch channel; see [`AuthContext::subscribe`].
pub struct AuthContext {
    provider: Arc<dyn AuthProvider>,
    user: watch::Sender<Option<User>>,
}

impl AuthContext {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        let (user, _) = watch::channel(None);
        Self { provider, user }
    }

    /// Restore the provider's existing session. Failures are logged and leave
    /// the context signed out.
    pub async fn initialize(&self) {
        match self.provider.current_user().await {
            Ok(user) => self.publish(user),
            Err(err) => warn!(error = %err, "auth initialization failed"),
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> AuthnResult<User> {
        let user = self.provider.sign_in(credentials).await?;
        info!(user = %user.id, "signed in");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    pub async fn signup(&self, credentials: &SignUpCredentials) -> AuthnResult<User> {
        let user = self.provider.sign_up(credentials).await?;
        info!(user = %user.id, "signed up");
        self.publish(Some(user.clone()));
        Ok(user)
    }

    /// Sign out. The user stays published if the provider refuses.
    pub async fn logout(&self) -> AuthnResult<()> {
        self.provider.sign_out().await?;
        self.publish(None);
        Ok(())
    }

    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    pub fn role(&self) -> Option<String> {
        self.user.borrow().as_ref().and_then(|user| user.role.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    fn publish(&self, user: Option<User>) {
        self.user.send_if_modified(|current| {
            if *current == user {
                return false;
            }
            *current = user;
            true
        });
    }
}
