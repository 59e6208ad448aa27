//! HTTP and WebSocket gateway for VoltDesk.
//!
//! Exposes account registration and login, token refresh, the password-reset
//! pair, ticket submission with technician assignment, telemetry scoring,
//! and a live telemetry stream.
//!
//! Built on Axum for high performance async HTTP.

pub mod auth_api;
pub mod error;
pub mod telemetry_api;
pub mod tickets_api;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use voltdesk_auth::TokenService;
use voltdesk_config::AppConfig;
use voltdesk_core::error::AuthError;
use voltdesk_core::notify::Notifier;
use voltdesk_core::repo::{TicketRepository, UserDirectory};
use voltdesk_dispatch::DispatchEngine;
use voltdesk_notify::{EmailNotifier, EmailSettings, SmsNotifier, SmsSettings};
use voltdesk_scorer::AnomalyModel;
use voltdesk_store::SqliteStore;

use crate::error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub directory: Arc<dyn UserDirectory>,
    pub dispatch: DispatchEngine,
    pub tokens: TokenService,
    /// Loaded anomaly model; `None` disables telemetry scoring
    pub scorer: Option<AnomalyModel>,
    /// Configured reset-token senders
    pub notifiers: Vec<Arc<dyn Notifier>>,
}

pub type SharedState = Arc<GatewayState>;

/// Assemble the gateway state on top of an opened store.
pub fn build_state(
    config: AppConfig,
    store: Arc<SqliteStore>,
) -> Result<SharedState, Box<dyn std::error::Error>> {
    let directory: Arc<dyn UserDirectory> = store.clone();
    let tickets: Arc<dyn TicketRepository> = store;
    let dispatch = DispatchEngine::new(directory.clone(), tickets);

    let tokens = TokenService::new(
        &config.auth.access_keys,
        &config.auth.refresh_keys,
        config.auth.access_ttl_minutes,
        config.auth.refresh_ttl_days,
    )?;

    let scorer = match AnomalyModel::load(Path::new(&config.scorer.model_path)) {
        Ok(Some(model)) => {
            info!(path = %config.scorer.model_path, "Anomaly model loaded");
            Some(model)
        }
        Ok(None) => {
            warn!(path = %config.scorer.model_path, "No anomaly model found; telemetry scoring disabled");
            None
        }
        Err(e) => {
            error!(error = %e, "Failed to load anomaly model; telemetry scoring disabled");
            None
        }
    };

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if config.email.smtp_host.is_some() {
        let email = EmailNotifier::new(EmailSettings {
            smtp_host: config.email.smtp_host.clone(),
            smtp_port: config.email.smtp_port,
            smtp_user: config.email.smtp_user.clone(),
            smtp_pass: config.email.smtp_pass.clone(),
            from_address: config.email.from_address.clone(),
        })?;
        notifiers.push(Arc::new(email));
    }
    if config.sms.account_sid.is_some() {
        notifiers.push(Arc::new(SmsNotifier::new(SmsSettings {
            account_sid: config.sms.account_sid.clone(),
            auth_token: config.sms.auth_token.clone(),
            from_number: config.sms.from_number.clone(),
        })));
    }

    Ok(Arc::new(GatewayState {
        config,
        directory,
        dispatch,
        tokens,
        scorer,
        notifiers,
    }))
}

/// Build the Axum router with all gateway routes.
///
/// Security layers applied:
/// - Bearer token authentication on /users, /tickets, and /telemetry
/// - CORS restricted to configured origins
/// - Request body size limit
/// - In-memory sliding-window rate limiting per client
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/users/me", get(auth_api::me_handler))
        .route("/tickets", post(tickets_api::create_ticket_handler))
        .route("/telemetry", post(telemetry_api::telemetry_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(auth_api::register_handler))
        .route("/auth/token", post(auth_api::token_handler))
        .route("/auth/refresh", post(auth_api::refresh_handler))
        .route("/auth/forgot", post(auth_api::forgot_handler))
        .route("/auth/reset", post(auth_api::reset_handler))
        .route("/ws/stream", get(telemetry_api::ws_handler))
        .with_state(state.clone());

    let origins: Vec<HeaderValue> = state
        .config
        .gateway
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    // Rate limiter state: shared across all requests
    let rate_limiter = Arc::new(RateLimiter::new(
        state.config.gateway.rate_limit_per_minute as usize,
        Duration::from_secs(60),
    ));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(state.config.gateway.max_body_bytes))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(middleware::from_fn(log_failures))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server: open the store, run migrations, bind.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::new(&config.database.url).await?);
    store.run_migrations().await?;

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = build_state(config, store)?;
    let app = build_router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (bearer token or "anonymous").
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Rate limiting middleware. The client key is the Authorization header when
/// present, otherwise "anonymous". The /health endpoint is exempt so
/// monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key.chars().take(20).collect::<String>(), "Rate limit exceeded");
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded, retry in 60 seconds",
        ));
    }

    Ok(next.run(req).await)
}

// --- Middleware ---

/// Authentication middleware for the protected routes.
///
/// Requires a valid `Authorization: Bearer <access token>` header; loads the
/// caller's user record and stashes it in request extensions for handlers.
async fn auth_middleware(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::MissingToken)?;

    let claims = state.tokens.verify_access(token)?;

    // The subject may have been deleted since the token was issued.
    let user = state
        .directory
        .find_by_username(&claims.sub)
        .await
        .map_err(ApiError::from)?
        .ok_or(AuthError::InvalidOrExpired)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Log rejected and failed requests with their method and path.
async fn log_failures(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    let status = response.status();
    if status.is_server_error() {
        error!(%method, %path, %status, "Request failed");
    } else if status.is_client_error() {
        warn!(%method, %path, %status, "Request rejected");
    }
    response
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn test_state() -> SharedState {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        store.run_migrations().await.unwrap();
        build_state(AppConfig::default(), store).unwrap()
    }

    async fn test_app() -> (Router, SharedState) {
        let state = test_state().await;
        (build_router(state.clone()), state)
    }

    async fn send_json(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str, role: &str) -> i64 {
        let (status, body) = send_json(
            app,
            Method::POST,
            "/auth/register",
            None,
            json!({"username": username, "password": "hunter2!", "role": role}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    async fn login(app: &Router, username: &str, password: &str) -> Value {
        let form = format!("username={username}&password={password}");
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/token")
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Body::from(form))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn access_token(app: &Router, username: &str) -> String {
        login(app, username, "hunter2!").await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (app, _) = test_app().await;

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_login_and_fetch_profile() {
        let (app, _) = test_app().await;
        let id = register(&app, "driver1", "driver").await;

        let token = access_token(&app, "driver1").await;
        let (status, body) =
            send_json(&app, Method::GET, "/users/me", Some(&token), Value::Null).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"].as_i64().unwrap(), id);
        assert_eq!(body["username"], "driver1");
        assert_eq!(body["role"], "driver");
        // Secret columns must never serialize.
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let (app, _) = test_app().await;
        register(&app, "driver1", "driver").await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/auth/register",
            None,
            json!({"username": "driver1", "password": "other"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_rejected() {
        let (app, _) = test_app().await;
        register(&app, "driver1", "driver").await;

        let form = "username=driver1&password=wrong";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/token")
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(Body::from(form))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn refresh_issues_new_access_token() {
        let (app, _) = test_app().await;
        register(&app, "driver1", "driver").await;

        let tokens = login(&app, "driver1", "hunter2!").await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            json!({"refresh_token": tokens["refresh_token"]}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // The minted access token works on a protected route.
        let access = body["access_token"].as_str().unwrap();
        let (status, _) =
            send_json(&app, Method::GET, "/users/me", Some(access), Value::Null).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let (app, _) = test_app().await;
        register(&app, "driver1", "driver").await;

        let tokens = login(&app, "driver1", "hunter2!").await;
        let (status, _) = send_json(
            &app,
            Method::POST,
            "/auth/refresh",
            None,
            json!({"refresh_token": tokens["access_token"]}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let (app, _) = test_app().await;

        let request = Request::builder()
            .uri("/users/me")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let (status, _) = send_json(
            &app,
            Method::GET,
            "/users/me",
            Some("not-a-real-token"),
            Value::Null,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ticket_assigned_to_least_loaded_technician() {
        let (app, _) = test_app().await;
        let tech_id = register(&app, "tech1", "technician").await;
        register(&app, "user1", "driver").await;

        let token = access_token(&app, "user1").await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/tickets",
            Some(&token),
            json!({"title": "Test"}),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["assigned_to"].as_i64().unwrap(), tech_id);
        assert_eq!(body["status"], "open");
        assert_eq!(body["priority"], "normal");
    }

    #[tokio::test]
    async fn ticket_without_technicians_left_unassigned() {
        let (app, _) = test_app().await;
        register(&app, "user1", "driver").await;

        let token = access_token(&app, "user1").await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/tickets",
            Some(&token),
            json!({"title": "Charging port stuck", "vehicle_id": "EV-042"}),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["assigned_to"].is_null());
        assert_eq!(body["vehicle_id"], "EV-042");
    }

    #[tokio::test]
    async fn empty_ticket_title_rejected() {
        let (app, _) = test_app().await;
        register(&app, "user1", "driver").await;

        let token = access_token(&app, "user1").await;
        let (status, _) = send_json(
            &app,
            Method::POST,
            "/tickets",
            Some(&token),
            json!({"title": "   "}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn telemetry_scores_null_without_model() {
        let (app, _) = test_app().await;
        register(&app, "user1", "driver").await;

        let token = access_token(&app, "user1").await;
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/telemetry",
            Some(&token),
            json!({
                "time_s": 12,
                "pack_voltage": 394.0,
                "pack_current": -80.0,
                "soc": 76.0,
                "soh": 97.5,
                "cell_temp_max": 31.2,
                "cell_temp_min": 29.8,
                "coolant_temp": 30.0,
                "motor_rpm": 5200.0,
                "motor_torque": 180.0,
                "inverter_temp": 48.0,
                "speed_kph": 88.0
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["score"].is_null());
        assert!(body["label"].is_null());
        assert_eq!(body["telemetry"]["soc"].as_f64().unwrap(), 76.0);
    }

    #[tokio::test]
    async fn forgot_answers_identically_for_unknown_accounts() {
        let (app, _) = test_app().await;

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/auth/forgot",
            None,
            json!({"username": "nobody"}),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body["detail"].as_str().unwrap().contains("If the account"));
    }

    #[tokio::test]
    async fn password_reset_roundtrip() {
        let (app, state) = test_app().await;
        register(&app, "driver1", "driver").await;

        // Issue the token directly; delivery is out of band.
        let user = state
            .directory
            .find_by_username("driver1")
            .await
            .unwrap()
            .unwrap();
        let token = voltdesk_auth::reset::begin_reset(state.directory.as_ref(), &user, 60)
            .await
            .unwrap();

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/auth/reset",
            None,
            json!({"token": token, "new_password": "n3w-pass!"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Single use: the same token is dead now.
        let (status, _) = send_json(
            &app,
            Method::POST,
            "/auth/reset",
            None,
            json!({"token": token, "new_password": "another"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        // And the new password logs in.
        let tokens = login(&app, "driver1", "n3w-pass!").await;
        assert!(tokens["access_token"].is_string());
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        store.run_migrations().await.unwrap();
        let mut config = AppConfig::default();
        config.gateway.rate_limit_per_minute = 2;
        let app = build_router(build_state(config, store).unwrap());

        for _ in 0..2 {
            let (status, _) = send_json(
                &app,
                Method::POST,
                "/auth/forgot",
                None,
                json!({"username": "nobody"}),
            )
            .await;
            assert_eq!(status, StatusCode::ACCEPTED);
        }
        let (status, _) = send_json(
            &app,
            Method::POST,
            "/auth/forgot",
            None,
            json!({"username": "nobody"}),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn rate_limiter_sliding_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("client"));
        assert!(limiter.check("client"));
        assert!(!limiter.check("client"));
        // Other clients are unaffected.
        assert!(limiter.check("other"));
    }
}
