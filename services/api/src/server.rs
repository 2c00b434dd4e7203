use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingNotificationSink};
use crate::routes::with_fulfillment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use posting_fulfillment::config::AppConfig;
use posting_fulfillment::error::AppError;
use posting_fulfillment::telemetry;
use posting_fulfillment::workflows::fulfillment::{
    FulfillmentCoordinator, InMemoryFulfillmentStore,
};
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

    let coordinator = Arc::new(FulfillmentCoordinator::new(
        Arc::new(InMemoryFulfillmentStore::default()),
        Arc::new(LoggingNotificationSink),
        config.fulfillment,
    ));

    let app = with_fulfillment_routes(coordinator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        score_policy = config.fulfillment.score_policy.label(),
        invite_window_hours = config.fulfillment.invite_window_hours,
        "posting fulfillment coordinator ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
