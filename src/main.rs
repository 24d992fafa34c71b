//! TaxDesk Portal
//!
//! Backend for the TaxDesk client and admin portals.
//!
//! ## Features
//!
//! - **Client portal**: service requests with a document checklist, uploads,
//!   and a message timeline
//! - **Admin portal**: triage queues, status lifecycle, assignment, access
//!   control
//! - **Notifications**: transactional email on lifecycle events, in-app
//!   notifications, and SSE feeds for open viewers

mod config;
mod db;
mod events;
mod handlers;
mod models;
mod notify;
mod services;
mod storage;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::fs;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use events::EventHub;
use handlers::AppState;
use notify::{ConsoleMailer, Dispatcher, Mailer, SmtpMailer};
use storage::DocumentStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taxdesk_portal=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting TaxDesk Portal");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Ensure the document store root exists
    let upload_dir = PathBuf::from(&config.upload_dir);
    fs::create_dir_all(&upload_dir).await?;
    tracing::info!("Document store: {:?}", upload_dir);

    // Pick the email transport
    let mailer: Arc<dyn Mailer> = match (&config.notify.smtp, &config.notify.from_email) {
        (Some(smtp), Some(from)) => {
            let smtp_mailer = Arc::new(SmtpMailer::new(
                smtp,
                from,
                &config.notify.from_name,
                &config.notify.portal_url,
            )?);
            if config.notify.verify_connection {
                let probe = Arc::clone(&smtp_mailer);
                tokio::spawn(async move {
                    if probe.test_connection().await {
                        tracing::info!("SMTP connection verified");
                    } else {
                        tracing::warn!("SMTP connection test failed; sends may not go through");
                    }
                });
            }
            smtp_mailer
        }
        _ => {
            tracing::warn!("SMTP not configured; email degrades to the console transport");
            Arc::new(ConsoleMailer::new())
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        mailer,
        Duration::from_secs(config.notify.send_timeout_secs),
    ));

    // Create application state
    let state = AppState {
        pool: pool.clone(),
        store: DocumentStore::new(upload_dir),
        hub: Arc::new(EventHub::new()),
        dispatcher,
        notify: config.notify.clone(),
        owner_email: config.owner_email.clone(),
        max_upload_size: config.max_upload_size,
        session_expiry_hours: config.session_expiry_hours,
        is_production: config.is_production(),
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    // Public endpoints
    let public_routes = Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::current_user))
        .route(
            "/submit-contact",
            post(handlers::submit_contact).get(handlers::contact_health),
        )
        .route("/notify", post(handlers::notify_endpoint));

    // Signed-in portal endpoints (clients and admins)
    let session_routes = Router::new()
        .route(
            "/submissions",
            post(handlers::create_submission).get(handlers::list_my_submissions),
        )
        .route("/submissions/:id", get(handlers::get_submission))
        .route(
            "/submissions/:id/files",
            post(handlers::upload_document).get(handlers::list_files),
        )
        .route(
            "/submissions/:id/files/archive",
            get(handlers::download_archive),
        )
        .route(
            "/submissions/:id/files/:file_id",
            delete(handlers::delete_file),
        )
        .route(
            "/submissions/:id/files/:file_id/download",
            get(handlers::download_file),
        )
        .route(
            "/submissions/:id/messages",
            post(handlers::post_message).get(handlers::list_messages),
        )
        .route("/submissions/:id/events", get(handlers::submission_events))
        .route("/events", get(handlers::user_events))
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/read-all", post(handlers::mark_all_read))
        .route("/notifications/:id/read", post(handlers::mark_read))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_session,
        ));

    // Admin endpoints
    let admin_routes = Router::new()
        .route("/admin/submissions", get(handlers::list_submissions_admin))
        .route(
            "/admin/submissions/:id/status",
            put(handlers::update_status),
        )
        .route("/admin/recent", get(handlers::recent_activity))
        .route("/admin/stats", get(handlers::dashboard_stats))
        .route("/admin/admins", get(handlers::list_admins))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_admin,
        ));

    // Lead-admin endpoints
    let lead_routes = Router::new()
        .route("/admin/queue", get(handlers::master_queue))
        .route(
            "/admin/submissions/:id/assign",
            post(handlers::assign_submission),
        )
        .route(
            "/admin/access-requests",
            get(handlers::list_access_requests),
        )
        .route(
            "/admin/access-requests/:id/approve",
            post(handlers::approve_access_request),
        )
        .route(
            "/admin/access-requests/:id/deny",
            post(handlers::deny_access_request),
        )
        .route("/admin/revoke", post(handlers::revoke_admin))
        .route("/admin/members", get(handlers::list_members))
        .route("/admin/members/:user_id", delete(handlers::delete_account))
        .route("/admin/reset", post(handlers::reset_all))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_lead,
        ));

    let api_routes = public_routes
        .merge(session_routes)
        .merge(admin_routes)
        .merge(lead_routes);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .nest_service("/", ServeDir::new(&config.frontend_dir))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::security_headers,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_upload_size))
        .layer(cors)
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Frontend served from: {}", config.frontend_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
