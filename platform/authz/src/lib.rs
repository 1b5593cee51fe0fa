//! Menu access control.
//!
//! Roles are allowed every menu unless a rule denies it. [`PermissionContext`]
//! caches the current role's [`DenialList`] and answers `can_access` without
//! suspending; [`PermissionStore`] is where the rules come from.

mod context;
mod denial;
mod store;

use std::time::Duration;

use thiserror::Error;

pub use context::{AccessState, PermissionConfig, PermissionContext, Phase, normalize_role};
pub use denial::DenialList;
pub use store::PermissionStore;

#[derive(Clone, Debug, Error)]
pub enum AuthzError {
    #[error("permission fetch for role {role} failed: {message}")]
    Fetch { role: String, message: String },
    #[error("permission fetch for role {role} timed out after {timeout:?}")]
    Timeout { role: String, timeout: Duration },
}

pub type AuthzResult<T> = Result<T, AuthzError>;
