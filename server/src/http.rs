use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use platform_authn::{AuthnError, LoginCredentials, SignUpCredentials, User};
use platform_db::{DbPool, sessions};
use serde::Serialize;
use time::Duration as TimeDuration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    graphql::{Requester, SchemaType},
};

const SESSION_COOKIE: &str = "__Host-mg_session";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "menu-guard listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(AllowOrigin::list(allowed))
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/graphql", post(graphql_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

async fn login_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<LoginCredentials>,
) -> HttpResult<(PrivateCookieJar, Json<User>)> {
    let user = platform_authn::authenticate(&state.pool, &credentials).await?;
    let jar = start_session(&state, jar, &user).await?;
    info!(user = %user.id, "signed in");
    Ok((jar, Json(user)))
}

async fn signup_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<SignUpCredentials>,
) -> HttpResult<(PrivateCookieJar, (StatusCode, Json<User>))> {
    let user =
        platform_authn::register(&state.pool, &credentials, &state.config.default_role).await?;
    let jar = start_session(&state, jar, &user).await?;
    Ok((jar, (StatusCode::CREATED, Json(user))))
}

async fn start_session(
    state: &AppState,
    jar: PrivateCookieJar,
    user: &User,
) -> HttpResult<PrivateCookieJar> {
    let session = sessions::create_session(&state.pool, user.id, state.config.session_ttl)
        .await
        .map_err(|err| HttpError::internal(err.into()))?;
    let cookie = Cookie::build((SESSION_COOKIE, session.id.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::seconds(state.config.session_ttl.num_seconds()))
        .build();
    Ok(jar.add(cookie))
}

async fn logout_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> HttpResult<(PrivateCookieJar, StatusCode)> {
    if let Some(session_id) = session_id(&jar) {
        if let Err(err) = sessions::delete_session(&state.pool, session_id).await {
            warn!(error = %err, "failed to delete session on logout");
        }
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn graphql_handler(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    request: GraphQLRequest,
) -> HttpResult<GraphQLResponse> {
    let user = load_session(&state, &jar).await?;
    let req = request.into_inner().data(Requester(user));
    let response = state.schema.execute(req).await;
    Ok(GraphQLResponse::from(response))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.pool.ping().await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

type HttpResult<T> = Result<T, HttpError>;

fn session_id(jar: &PrivateCookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// The signed-in user, if the cookie names a live session of an active profile.
async fn load_session(state: &AppState, jar: &PrivateCookieJar) -> HttpResult<Option<User>> {
    let Some(session_id) = session_id(jar) else {
        return Ok(None);
    };
    let Some(session) = sessions::find_live_session(&state.pool, session_id)
        .await
        .map_err(|err| HttpError::internal(err.into()))?
    else {
        return Ok(None);
    };
    Ok(platform_authn::load_user(&state.pool, session.profile_id).await?)
}

#[derive(Debug)]
struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<AuthnError> for HttpError {
    fn from(value: AuthnError) -> Self {
        match value {
            AuthnError::InvalidCredentials | AuthnError::InactiveAccount => {
                Self::new(StatusCode::UNAUTHORIZED, value.to_string())
            }
            AuthnError::EmailTaken => Self::new(StatusCode::CONFLICT, value.to_string()),
            AuthnError::InvalidEmail | AuthnError::WeakPassword => {
                Self::new(StatusCode::BAD_REQUEST, value.to_string())
            }
            AuthnError::Hash(_) | AuthnError::Store(_) => Self::internal(value.into()),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
