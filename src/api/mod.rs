use crate::{
    api::handlers::{actions, auth, certs, health, panes, snapshot},
    certs::CertStore,
    config::DashboardConfig,
    tmux::{ActionExecutor, Collector, SystemCollector, TmuxExecutor},
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, ORIGIN},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Extension, Router,
};
use std::{
    collections::BTreeSet,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;

pub mod handlers;

/// Request-independent settings handlers read.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub allowed_actions: BTreeSet<String>,
}

/// Everything the router hands to handlers.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<auth::AuthService>,
    pub collector: Arc<dyn Collector>,
    pub executor: Arc<dyn ActionExecutor>,
    pub certs: Arc<CertStore>,
    pub settings: Arc<Settings>,
}

impl Services {
    /// Production wiring: local tmux/ps/lsof and the JSON cert store.
    ///
    /// # Errors
    /// Returns an error if the cert store directory cannot be created.
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let certs = CertStore::open(&config.cert_data_file).with_context(|| {
            format!(
                "Failed to open cert store {}",
                config.cert_data_file.display()
            )
        })?;
        Ok(Self {
            auth: Arc::new(auth::AuthService::new(auth::AuthConfig::from_dashboard(
                config,
            ))),
            collector: Arc::new(SystemCollector::new()),
            executor: Arc::new(TmuxExecutor::new()),
            certs: Arc::new(certs),
            settings: Arc::new(Settings {
                allowed_actions: config.allowed_actions.clone(),
            }),
        })
    }
}

/// Build the API router with every route and the middleware stack.
#[must_use]
pub fn router(services: Services, cors_origins: &BTreeSet<String>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(AllowOrigin::list(allowed_origins(cors_origins)))
        .vary([ORIGIN]);

    let certs_routes = Router::new()
        .route("/devices", get(certs::list_devices))
        .route(
            "/requests",
            get(certs::list_requests).post(certs::create_request),
        )
        .route("/requests/:request_id/mark-issued", post(certs::mark_issued))
        .route("/links", get(certs::list_links).post(certs::create_link))
        .route("/links/:link_id/revoke", post(certs::revoke_link))
        .route("/audit", get(certs::list_audit))
        .route("/distribution/:token", get(certs::distribution));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/snapshot", get(snapshot::snapshot))
        .route("/api/panes/:pane_id", get(panes::pane_detail))
        // OPTIONS never reaches the handlers: the CORS layer answers it and
        // `options_no_content` turns its 200 into 204.
        .route("/api/actions/:action", post(actions::run_action))
        .nest("/api/certs", certs_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(middleware::from_fn(options_no_content))
                .layer(cors)
                .layer(Extension(services.auth))
                .layer(Extension(services.collector))
                .layer(Extension(services.executor))
                .layer(Extension(services.certs))
                .layer(Extension(services.settings)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: &DashboardConfig, bind: IpAddr) -> Result<()> {
    let services = Services::from_config(config)?;
    let app = router(services, &config.cors_origins);

    let addr = SocketAddr::new(bind, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal, initiating shutdown"),
        () = terminate => info!("Received SIGTERM signal, initiating shutdown"),
    }
}

/// Answer bodiless `OPTIONS` requests with 204 No Content.
async fn options_no_content(request: Request, next: Next) -> Response {
    let is_options = request.method() == Method::OPTIONS;
    let mut response = next.run(request).await;
    if is_options && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn allowed_origins(configured: &BTreeSet<String>) -> Vec<HeaderValue> {
    configured
        .iter()
        .filter_map(|raw| match cors_origin(raw) {
            Ok(origin) => Some(origin),
            Err(err) => {
                warn!("Ignoring CORS origin {raw:?}: {err:#}");
                None
            }
        })
        .collect()
}

/// Normalize a configured origin to `scheme://host[:port]`.
fn cors_origin(raw: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(raw).with_context(|| format!("Invalid origin: {raw}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Origin must include a valid host: {raw}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build origin header")
}
