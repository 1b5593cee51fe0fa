use std::sync::Arc;
use std::time::Duration;

use platform_authn::User;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{AuthzError, AuthzResult, DenialList, PermissionStore};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the cache is in its lifecycle.
///
/// `Uninitialized` and `Loading` both answer `can_access` with `true`: until a
/// denial list for the current role is installed, menus stay visible. Server
/// side checks are the authoritative gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Loading,
    Ready,
}

#[derive(Clone, Debug)]
pub struct PermissionConfig {
    pub fetch_timeout: Duration,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    role: String,
    denied: DenialList,
}

/// Observable state of a [`PermissionContext`].
#[derive(Clone, Debug)]
pub struct AccessState {
    role: Option<String>,
    phase: Phase,
    snapshot: Option<Arc<Snapshot>>,
    last_error: Option<String>,
    generation: u64,
}

impl AccessState {
    fn new() -> Self {
        Self {
            role: None,
            phase: Phase::Uninitialized,
            snapshot: None,
            last_error: None,
            generation: 0,
        }
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn can_access(&self, menu_id: &str) -> bool {
        match self.phase {
            Phase::Uninitialized | Phase::Loading => true,
            Phase::Ready => self
                .denials()
                .is_none_or(|denied| denied.allows(menu_id)),
        }
    }

    /// Denial list of the current role, if one was ever loaded for it.
    fn denials(&self) -> Option<&DenialList> {
        let snapshot = self.snapshot.as_deref()?;
        (self.role.as_deref() == Some(snapshot.role.as_str())).then_some(&snapshot.denied)
    }
}

/// The role as the context records it: trimmed, with blank meaning none.
pub fn normalize_role(role: Option<&str>) -> Option<String> {
    role.map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
}

/// One issued fetch. Its result only lands while `generation` is current.
struct Ticket {
    role: String,
    generation: u64,
}

/// Cache of the current role's menu denials.
///
/// Readers never block on a fetch: the state is swapped whole inside a watch
/// channel once a fetch completes, and completions from superseded fetches
/// are dropped on arrival.
pub struct PermissionContext {
    store: Arc<dyn PermissionStore>,
    config: PermissionConfig,
    state: watch::Sender<AccessState>,
}

impl PermissionContext {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self::with_config(store, PermissionConfig::default())
    }

    pub fn with_config(store: Arc<dyn PermissionStore>, config: PermissionConfig) -> Self {
        let (state, _) = watch::channel(AccessState::new());
        Self {
            store,
            config,
            state,
        }
    }

    /// Whether the current role may open `menu_id`. Never suspends.
    pub fn can_access(&self, menu_id: &str) -> bool {
        self.state.borrow().can_access(menu_id)
    }

    /// Sorted ids denied to the current role.
    pub fn denied_menu_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .denials()
            .map(DenialList::menu_ids)
            .unwrap_or_default()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == Phase::Loading
    }

    pub fn role(&self) -> Option<String> {
        self.state.borrow().role.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    pub fn state(&self) -> AccessState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccessState> {
        self.state.subscribe()
    }

    /// Switch to `role` and load its denials. Re-setting the current role is
    /// a no-op; `None` (signed out) drops all denials.
    pub async fn set_role(&self, role: Option<String>) -> AuthzResult<()> {
        match self.stage(role, false) {
            Some(ticket) => self.load(ticket).await,
            None => Ok(()),
        }
    }

    /// Refetch the current role's denials. On failure the previous list stays.
    pub async fn refresh_permissions(&self) -> AuthzResult<()> {
        match self.stage(self.role(), true) {
            Some(ticket) => self.load(ticket).await,
            None => Ok(()),
        }
    }

    /// Resolves once no fetch is in flight.
    pub async fn settled(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| state.phase != Phase::Loading).await;
    }

    /// Follow the role of whoever is signed in on `users`.
    pub fn bind(self: &Arc<Self>, mut users: watch::Receiver<Option<User>>) -> JoinHandle<()> {
        let ctx = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let role = users
                    .borrow_and_update()
                    .as_ref()
                    .and_then(|user| user.role.clone());
                if let Some(ticket) = ctx.stage(role, false) {
                    let ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        let _ = ctx.load(ticket).await;
                    });
                }
                if users.changed().await.is_err() {
                    debug!("auth context dropped; permission binding stops");
                    break;
                }
            }
        })
    }

    /// Record the new role and issue a ticket when a fetch is needed.
    fn stage(&self, role: Option<String>, force: bool) -> Option<Ticket> {
        let role = normalize_role(role.as_deref());
        let mut ticket = None;
        self.state.send_if_modified(|state| {
            if !force && state.role == role {
                return false;
            }
            state.generation += 1;
            state.role = role.clone();
            match role {
                Some(role) => {
                    state.phase = Phase::Loading;
                    ticket = Some(Ticket {
                        role,
                        generation: state.generation,
                    });
                }
                None => {
                    state.phase = Phase::Uninitialized;
                    state.snapshot = None;
                    state.last_error = None;
                }
            }
            true
        });
        ticket
    }

    async fn load(&self, ticket: Ticket) -> AuthzResult<()> {
        let timeout = self.config.fetch_timeout;
        let fetched = match tokio::time::timeout(timeout, self.store.denied_menu_ids(&ticket.role))
            .await
        {
            Ok(Ok(ids)) => Ok(Arc::new(Snapshot {
                role: ticket.role.clone(),
                denied: ids.into_iter().collect(),
            })),
            Ok(Err(err)) => Err(AuthzError::Fetch {
                role: ticket.role.clone(),
                message: format!("{err:#}"),
            }),
            Err(_) => Err(AuthzError::Timeout {
                role: ticket.role.clone(),
                timeout,
            }),
        };

        let applied = self.state.send_if_modified(|state| {
            if state.generation != ticket.generation {
                return false;
            }
            state.phase = Phase::Ready;
            match &fetched {
                Ok(snapshot) => {
                    state.snapshot = Some(Arc::clone(snapshot));
                    state.last_error = None;
                }
                Err(err) => state.last_error = Some(err.to_string()),
            }
            true
        });

        if !applied {
            debug!(role = %ticket.role, "discarding superseded permission fetch");
            return Ok(());
        }
        match fetched {
            Ok(snapshot) => {
                info!(role = %ticket.role, denied = snapshot.denied.len(), "menu permissions loaded");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "keeping previous menu permissions");
                Err(err)
            }
        }
    }
}
