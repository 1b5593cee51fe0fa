mod config;
mod graphql;
mod http;
mod seed;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_authn::{AuthContext, DbAuthProvider, LoginCredentials};
use platform_authz::{PermissionConfig, PermissionContext, Phase, normalize_role};
use platform_db::{DatabaseSettings, DbPool, PermissionRepository, connect};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "menu-guard", version, about = "Role-based menu access control")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Insert the default menus and deny rules.
    Seed,
    /// Inspect or change menu permission rules.
    #[command(subcommand)]
    Permissions(PermissionsCommand),
    /// Evaluate menu access the way a signed-in client would.
    #[command(subcommand)]
    Access(AccessCommand),
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Subcommand, Debug)]
enum PermissionsCommand {
    /// List stored rules, optionally for one role.
    List {
        #[arg(long)]
        role: Option<String>,
    },
    /// Allow or deny one menu for one role.
    #[command(group(ArgGroup::new("verdict").required(true).args(["allow", "deny"])))]
    Set {
        role: String,
        menu_id: String,
        #[arg(long)]
        allow: bool,
        #[arg(long)]
        deny: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AccessCommand {
    /// Sign in and report which of the given menus the profile may open.
    Check {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MENU_GUARD_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(required = true)]
        menu_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::from_env())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Seed => {
            let pool = setup_pool().await?;
            seed::run(&pool, &app_config).await
        }
        Command::Permissions(cmd) => run_permissions(cmd).await,
        Command::Access(AccessCommand::Check {
            email,
            password,
            menu_ids,
        }) => check_access(&app_config, email, password, menu_ids).await,
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings)
        .await
        .context("failed to connect to the database")
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let cookie_key = config.require_cookie_key()?;
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;
    let schema = graphql::build_schema(GraphqlData {
        pool: pool.clone(),
        admin_role: config.admin_role.clone(),
    });
    let state = AppState {
        pool,
        schema,
        config,
        cookie_key,
    };
    http::serve(cmd.into(), state).await
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `menu-guard migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}

async fn run_permissions(cmd: PermissionsCommand) -> Result<()> {
    let repo = PermissionRepository::new(setup_pool().await?);
    match cmd {
        PermissionsCommand::List { role } => {
            let rows = match role {
                Some(role) => repo.permissions_by_role(&role).await?,
                None => repo.all_permissions().await?,
            };
            for row in rows {
                let verdict = if row.can_access { "allow" } else { "deny" };
                println!("{}\t{}\t{}", row.role, row.menu_id, verdict);
            }
        }
        PermissionsCommand::Set {
            role,
            menu_id,
            allow,
            deny: _,
        } => {
            repo.update_permission(&role, &menu_id, allow).await?;
            info!(%role, %menu_id, can_access = allow, "menu permission stored");
        }
    }
    Ok(())
}

/// Drive an auth context and a bound permission context end to end.
async fn check_access(
    config: &AppConfig,
    email: String,
    password: String,
    menu_ids: Vec<String>,
) -> Result<()> {
    let pool = setup_pool().await?;
    let provider = Arc::new(DbAuthProvider::new(pool.clone(), config.default_role.clone()));
    let auth = AuthContext::new(provider);
    let permissions = Arc::new(PermissionContext::with_config(
        Arc::new(PermissionRepository::new(pool)),
        PermissionConfig {
            fetch_timeout: config.permission_fetch_timeout,
        },
    ));
    let binding = permissions.bind(auth.subscribe());

    let user = auth
        .login(&LoginCredentials { email, password })
        .await
        .context("sign in failed")?;
    let role = normalize_role(user.role.as_deref());
    let mut states = permissions.subscribe();
    states
        .wait_for(|state| state.role() == role.as_deref() && state.phase() != Phase::Loading)
        .await
        .context("permission context closed")?;

    println!(
        "{} (role: {})",
        user.email,
        role.as_deref().unwrap_or("none")
    );
    if let Some(err) = permissions.last_error() {
        println!("warning: {err}; answering from the last known rules");
    }
    for menu_id in &menu_ids {
        let verdict = if permissions.can_access(menu_id) {
            "allowed"
        } else {
            "denied"
        };
        println!("{menu_id}\t{verdict}");
    }

    auth.logout().await?;
    binding.abort();
    Ok(())
}
