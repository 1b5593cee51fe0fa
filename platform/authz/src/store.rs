use async_trait::async_trait;
use platform_db::PermissionRepository;

/// Source of menu denial rules.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Menu ids explicitly denied to `role`.
    async fn denied_menu_ids(&self, role: &str) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
impl PermissionStore for PermissionRepository {
    async fn denied_menu_ids(&self, role: &str) -> anyhow::Result<Vec<String>> {
        Ok(PermissionRepository::denied_menu_ids(self, role).await?)
    }
}
