use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use platform_authn::{AuthContext, DbAuthProvider, LoginCredentials, SignUpCredentials};
use platform_authz::{PermissionConfig, PermissionContext, Phase};
use platform_db::{MenuPermissionUpdate, PermissionRepository, ProfileRepository};
use suite_tests::{ControlledStore, memory_pool};

fn context(store: Arc<ControlledStore>) -> Arc<PermissionContext> {
    Arc::new(PermissionContext::with_config(
        store,
        PermissionConfig {
            fetch_timeout: Duration::from_secs(5),
        },
    ))
}

#[tokio::test]
async fn roles_without_rules_see_everything() -> Result<()> {
    let pool = memory_pool().await?;
    let ctx = context(Arc::new(ControlledStore::new(pool)));

    ctx.set_role(Some("user".into())).await?;
    assert_eq!(ctx.phase(), Phase::Ready);
    assert!(ctx.can_access("dashboard"));
    assert!(ctx.can_access("admin-panel"));
    assert!(ctx.denied_menu_ids().is_empty());
    Ok(())
}

#[tokio::test]
async fn denied_menu_is_hidden_after_refresh() -> Result<()> {
    let pool = memory_pool().await?;
    let repo = PermissionRepository::new(pool.clone());
    let ctx = context(Arc::new(ControlledStore::new(pool)));
    ctx.set_role(Some("user".into())).await?;
    assert!(ctx.can_access("admin-panel"));

    repo.update_permission("user", "admin-panel", false).await?;
    ctx.refresh_permissions().await?;

    assert!(!ctx.can_access("admin-panel"));
    assert!(ctx.can_access("dashboard"));
    assert_eq!(ctx.denied_menu_ids(), vec!["admin-panel".to_string()]);
    Ok(())
}

#[tokio::test]
async fn repeated_writes_converge() -> Result<()> {
    let pool = memory_pool().await?;
    let repo = PermissionRepository::new(pool);
    repo.update_permission("user", "reports", false).await?;
    repo.update_permission("user", "reports", false).await?;

    let rows = repo.permissions_by_role("user").await?;
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].can_access);
    Ok(())
}

#[tokio::test]
async fn batch_of_mixed_rules_denies_only_the_denied() -> Result<()> {
    let pool = memory_pool().await?;
    let repo = PermissionRepository::new(pool);
    repo.update_permissions(&[
        MenuPermissionUpdate::deny("user", "a"),
        MenuPermissionUpdate::allow("user", "b"),
    ])
    .await?;

    assert_eq!(repo.denied_menu_ids("user").await?, vec!["a".to_string()]);
    assert_eq!(repo.accessible_menu_ids("user").await?, vec!["b".to_string()]);
    Ok(())
}

#[tokio::test]
async fn outage_keeps_last_known_rules() -> Result<()> {
    let pool = memory_pool().await?;
    let repo = PermissionRepository::new(pool.clone());
    repo.update_permission("user", "admin-panel", false).await?;
    let store = Arc::new(ControlledStore::new(pool));
    let ctx = context(Arc::clone(&store));
    ctx.set_role(Some("user".into())).await?;

    store.set_offline(true);
    repo.update_permission("user", "admin-panel", true).await?;
    assert!(ctx.refresh_permissions().await.is_err());

    assert_eq!(ctx.phase(), Phase::Ready);
    assert!(!ctx.can_access("admin-panel"));
    assert!(ctx.last_error().is_some());

    store.set_offline(false);
    ctx.refresh_permissions().await?;
    assert!(ctx.can_access("admin-panel"));
    assert!(ctx.last_error().is_none());
    Ok(())
}

#[tokio::test]
async fn newest_role_wins_over_slow_fetch() -> Result<()> {
    let pool = memory_pool().await?;
    let repo = PermissionRepository::new(pool.clone());
    repo.update_permission("guest", "reports", false).await?;
    repo.update_permission("admin", "audit", false).await?;
    let store = Arc::new(ControlledStore::new(pool));
    let ctx = context(Arc::clone(&store));

    let release_guest = store.hold("guest");
    let slow = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { ctx.set_role(Some("guest".into())).await })
    };
    let mut states = ctx.subscribe();
    states
        .wait_for(|state| state.role() == Some("guest"))
        .await?;

    ctx.set_role(Some("admin".into())).await?;
    let _ = release_guest.send(());
    slow.await??;

    assert_eq!(ctx.role().as_deref(), Some("admin"));
    assert!(ctx.can_access("reports"));
    assert!(!ctx.can_access("audit"));
    Ok(())
}

#[tokio::test]
async fn signing_in_and_out_drives_the_cache() -> Result<()> {
    let pool = memory_pool().await?;
    PermissionRepository::new(pool.clone())
        .update_permission("user", "admin-panel", false)
        .await?;
    let auth = AuthContext::new(Arc::new(DbAuthProvider::new(pool.clone(), "user")));
    let ctx = context(Arc::new(ControlledStore::new(pool.clone())));
    let binding = ctx.bind(auth.subscribe());

    auth.signup(&SignUpCredentials {
        email: "ada@example.test".into(),
        password: "hunter22".into(),
        name: Some("Ada".into()),
    })
    .await?;
    let mut states = ctx.subscribe();
    states
        .wait_for(|state| state.role() == Some("user") && state.phase() == Phase::Ready)
        .await?;
    assert!(!ctx.can_access("admin-panel"));

    auth.logout().await?;
    states
        .wait_for(|state| state.role().is_none())
        .await?;
    assert_eq!(ctx.phase(), Phase::Uninitialized);
    assert!(ctx.can_access("admin-panel"));

    binding.abort();
    Ok(())
}

#[tokio::test]
async fn deactivated_profiles_cannot_sign_in() -> Result<()> {
    let pool = memory_pool().await?;
    let auth = AuthContext::new(Arc::new(DbAuthProvider::new(pool.clone(), "user")));
    let user = auth
        .signup(&SignUpCredentials {
            email: "ada@example.test".into(),
            password: "hunter22".into(),
            name: None,
        })
        .await?;
    auth.logout().await?;

    ProfileRepository::new(pool)
        .set_profile_active(user.id, false)
        .await?;
    let login = auth
        .login(&LoginCredentials {
            email: "ada@example.test".into(),
            password: "hunter22".into(),
        })
        .await;
    assert!(login.is_err());
    assert!(!auth.is_authenticated());
    Ok(())
}
