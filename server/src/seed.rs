//! Fixture data for a fresh database: the default navigation tree, deny rules
//! keeping the default role out of administration, and an optional admin.

use anyhow::{Context, Result};
use platform_authn::{AuthnError, SignUpCredentials};
use platform_db::{
    DbError, DbPool, MenuInput, MenuPermissionUpdate, MenuRepository, PermissionRepository,
    ProfilePatch, ProfileRepository,
};
use tracing::{debug, info};

use crate::config::AppConfig;

struct SeedMenu {
    id: &'static str,
    name: &'static str,
    parent: Option<&'static str>,
    sort_order: i32,
    path: &'static str,
    icon: &'static str,
}

const MENUS: &[SeedMenu] = &[
    SeedMenu {
        id: "dashboard",
        name: "Dashboard",
        parent: None,
        sort_order: 1,
        path: "/dashboard",
        icon: "dashboard",
    },
    SeedMenu {
        id: "components",
        name: "Components",
        parent: None,
        sort_order: 2,
        path: "/components",
        icon: "widgets",
    },
    SeedMenu {
        id: "admin-panel",
        name: "Administration",
        parent: None,
        sort_order: 3,
        path: "/admin",
        icon: "admin_panel_settings",
    },
    SeedMenu {
        id: "users",
        name: "Users",
        parent: Some("admin-panel"),
        sort_order: 1,
        path: "/admin/users",
        icon: "people",
    },
    SeedMenu {
        id: "menu-permissions",
        name: "Menu Permissions",
        parent: Some("admin-panel"),
        sort_order: 2,
        path: "/admin/menu-permissions",
        icon: "lock",
    },
    SeedMenu {
        id: "menus",
        name: "Menus",
        parent: Some("admin-panel"),
        sort_order: 3,
        path: "/admin/menus",
        icon: "menu",
    },
];

/// Menus the default role may not open.
const DEFAULT_ROLE_DENIALS: &[&str] = &["admin-panel", "users", "menu-permissions", "menus"];

pub async fn run(pool: &DbPool, config: &AppConfig) -> Result<()> {
    let menus = MenuRepository::new(pool.clone());
    let mut created = 0;
    for menu in MENUS {
        let input = MenuInput {
            id: menu.id.to_string(),
            menu_name: menu.name.to_string(),
            parent_id: menu.parent.map(str::to_string),
            depth: if menu.parent.is_some() { 2 } else { 1 },
            sort_order: menu.sort_order,
            path: Some(menu.path.to_string()),
            icon: Some(menu.icon.to_string()),
            is_active: true,
        };
        match menus.create_menu(input).await {
            Ok(_) => created += 1,
            Err(DbError::Conflict { .. }) => debug!(id = menu.id, "menu already present"),
            Err(err) => return Err(err).with_context(|| format!("seeding menu {}", menu.id)),
        }
    }

    let rules: Vec<MenuPermissionUpdate> = DEFAULT_ROLE_DENIALS
        .iter()
        .map(|menu_id| MenuPermissionUpdate::deny(config.default_role.as_str(), *menu_id))
        .collect();
    let inserted = PermissionRepository::new(pool.clone())
        .insert_missing_permissions(&rules)
        .await
        .context("seeding menu permissions")?;
    info!(
        menus = created,
        rules = inserted,
        role = %config.default_role,
        "seed data applied"
    );

    if let (Ok(email), Ok(password)) = (
        std::env::var("SEED_ADMIN_EMAIL"),
        std::env::var("SEED_ADMIN_PASSWORD"),
    ) {
        seed_admin(pool, config, email, password).await?;
    }
    Ok(())
}

async fn seed_admin(
    pool: &DbPool,
    config: &AppConfig,
    email: String,
    password: String,
) -> Result<()> {
    let credentials = SignUpCredentials {
        email: email.clone(),
        password,
        name: Some("Administrator".into()),
    };
    let profile_id = match platform_authn::register(pool, &credentials, &config.admin_role).await
    {
        Ok(user) => user.id,
        Err(AuthnError::EmailTaken) => ProfileRepository::new(pool.clone())
            .find_by_email(&email)
            .await?
            .with_context(|| format!("profile {email} vanished while seeding"))?
            .id,
        Err(err) => return Err(err).context("seeding admin profile"),
    };
    ProfileRepository::new(pool.clone())
        .update_profile(
            profile_id,
            ProfilePatch {
                role: Some(config.admin_role.clone()),
                is_active: Some(true),
                ..ProfilePatch::default()
            },
        )
        .await?;
    info!(%email, role = %config.admin_role, "admin profile ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::test_support::memory_pool;

    #[tokio::test]
    async fn seeding_twice_is_harmless() {
        let pool = memory_pool().await;
        let config = AppConfig::from_lookup(|_| None).unwrap();
        run(&pool, &config).await.unwrap();
        run(&pool, &config).await.unwrap();

        let menus = MenuRepository::new(pool.clone()).list_menus().await.unwrap();
        assert_eq!(menus.len(), MENUS.len());
        let denied = PermissionRepository::new(pool)
            .denied_menu_ids("user")
            .await
            .unwrap();
        assert_eq!(denied, vec!["admin-panel", "menu-permissions", "menus", "users"]);
    }

    #[tokio::test]
    async fn reseeding_keeps_rules_an_admin_changed() {
        let pool = memory_pool().await;
        let config = AppConfig::from_lookup(|_| None).unwrap();
        run(&pool, &config).await.unwrap();
        let repo = PermissionRepository::new(pool.clone());
        repo.update_permission("user", "users", true).await.unwrap();

        run(&pool, &config).await.unwrap();

        assert_eq!(
            repo.denied_menu_ids("user").await.unwrap(),
            vec!["admin-panel", "menu-permissions", "menus"]
        );
        assert_eq!(repo.accessible_menu_ids("user").await.unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn admin_is_promoted_when_it_already_exists() {
        let pool = memory_pool().await;
        let config = AppConfig::from_lookup(|_| None).unwrap();
        platform_authn::register(
            &pool,
            &SignUpCredentials {
                email: "root@example.test".into(),
                password: "hunter22".into(),
                name: None,
            },
            "user",
        )
        .await
        .unwrap();

        seed_admin(&pool, &config, "root@example.test".into(), "hunter22".into())
            .await
            .unwrap();
        let profile = ProfileRepository::new(pool)
            .find_by_email("root@example.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.role.as_deref(), Some("admin"));
    }
}
