use crate::cli::ServeArgs;
use crate::infra::{load_registrar, AppState};
use crate::routes::with_registrar_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use registrar::config::AppConfig;
use registrar::enrollment::RegistrarService;
use registrar::error::AppError;
use registrar::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(load_registrar(args.catalog.as_deref())?);
    let service = Arc::new(RegistrarService::new(store, config.enrollment.clone()));

    let app = with_registrar_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_credits = %config.enrollment.max_credits,
        "registrar service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
