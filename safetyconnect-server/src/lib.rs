use axum::{
    routing::{get, post},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod error;
pub mod handlers;
pub mod hotline_table;
pub mod models;
pub mod services;

use safetyconnect_common::{
    AssignReportRequest, BulkUpdateRequest, BulkUpdateResponse, Coordinates, CreateReportRequest,
    DialableContact, EditReportRequest, EmergencyContact, ErrorResponse, HotlineResponse,
    LocationDescription, RegionSummary, Report, ReportEdit, ReportSnapshot, ReportSort,
    ReportStats, ReportStatus, ServiceRegion, SosAlert, SosRequest, SosResponse, SosStatus,
    SosStatusRequest, TimelineEntry, UpdateReportStatusRequest,
};

pub struct AppState {
    pub db: services::db::Database,
    pub settings: config::Settings,
    pub hotlines: services::hotlines::HotlineResolver,
}

impl AppState {
    /// Loads the region table and opens the database described by `settings`.
    pub async fn new(settings: config::Settings) -> error::AppResult<Self> {
        let table = hotline_table::RegionTable::load(settings.hotlines.table_path.as_deref())?;
        tracing::info!(regions = table.regions().len(), "Hotline table loaded");

        let db = services::db::Database::new(&settings.database.url).await?;

        Ok(Self {
            db,
            settings,
            hotlines: services::hotlines::HotlineResolver::new(table),
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::hotlines::get_hotlines,
        handlers::hotlines::describe_location,
        handlers::hotlines::list_regions,
        handlers::reports::create_report,
        handlers::reports::list_reports,
        handlers::reports::report_stats,
        handlers::reports::get_report,
        handlers::reports::edit_report,
        handlers::reports::delete_report,
        handlers::reports::update_report_status,
        handlers::reports::assign_report,
        handlers::reports::unassign_report,
        handlers::reports::bulk_update_reports,
        handlers::sos::raise_sos,
        handlers::sos::list_sos,
        handlers::sos::update_sos_status,
    ),
    components(
        schemas(
            Coordinates,
            EmergencyContact,
            ServiceRegion,
            RegionSummary,
            DialableContact,
            HotlineResponse,
            LocationDescription,
            Report,
            ReportStatus,
            ReportSort,
            ReportStats,
            TimelineEntry,
            ReportEdit,
            ReportSnapshot,
            CreateReportRequest,
            EditReportRequest,
            UpdateReportStatusRequest,
            AssignReportRequest,
            BulkUpdateRequest,
            BulkUpdateResponse,
            SosAlert,
            SosStatus,
            SosRequest,
            SosResponse,
            SosStatusRequest,
            ErrorResponse,
        )
    ),
    tags(
        (name = "SafetyConnect", description = "Emergency hotlines, incident reports and SOS alerts")
    )
)]
struct ApiDoc;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::new()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "safetyconnect_server={},tower_http=info",
            settings.server.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if settings.server.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let state = Arc::new(AppState::new(settings.clone()).await?);

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(settings.server.rate_limit_per_second)
            .burst_size(settings.server.rate_limit_burst)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health_check))
        .route(
            "/metrics",
            get(move || {
                let handle = metric_handle.clone();
                async move { handle.render() }
            }),
        )
        .nest("/api/v1", api_routes())
        .layer(prometheus_layer)
        .layer(GovernorLayer {
            config: governor_config,
        })
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            status = %response.status(),
                            latency = ?latency,
                            "finished processing request"
                        )
                    },
                ),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            settings.server.request_timeout_secs,
        )))
        .with_state(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("SafetyConnect server listening on http://{}", addr);

    // The rate limiter keys on the peer address.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/hotlines", get(handlers::hotlines::get_hotlines))
        .route(
            "/location/describe",
            get(handlers::hotlines::describe_location),
        )
        .route("/regions", get(handlers::hotlines::list_regions))
        .route(
            "/reports",
            post(handlers::reports::create_report).get(handlers::reports::list_reports),
        )
        .route("/reports/stats", get(handlers::reports::report_stats))
        .route("/reports/bulk", post(handlers::reports::bulk_update_reports))
        .route(
            "/reports/:tracking_id",
            get(handlers::reports::get_report)
                .patch(handlers::reports::edit_report)
                .delete(handlers::reports::delete_report),
        )
        .route(
            "/reports/:tracking_id/status",
            post(handlers::reports::update_report_status),
        )
        .route(
            "/reports/:tracking_id/assign",
            post(handlers::reports::assign_report).delete(handlers::reports::unassign_report),
        )
        .route(
            "/sos",
            post(handlers::sos::raise_sos).get(handlers::sos::list_sos),
        )
        .route("/sos/:id/status", post(handlers::sos::update_sos_status))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down gracefully...");
}
