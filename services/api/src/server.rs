use crate::cli::ServeArgs;
use crate::infra::{AppState, Deployment, DEMO_ADMIN_TOKEN};
use crate::routes::with_draw_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lucky_draw::config::AppConfig;
use lucky_draw::draws::{picker_for_seed, LuckyDrawService};
use lucky_draw::error::AppError;
use lucky_draw::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let deployment = Deployment::seeded(args.demo_users)?;
    if args.showcase {
        match deployment.open_showcase_draw(chrono::Utc::now()) {
            Ok(registry_id) => info!(%registry_id, "showcase lucky draw opened"),
            Err(err) => warn!(error = %err, "showcase lucky draw not opened"),
        }
    }

    let draw_service = Arc::new(
        LuckyDrawService::new(
            deployment.repository.clone(),
            deployment.catalog.clone(),
            deployment.directory.clone(),
            config.draws.policy,
        )
        .with_picker(picker_for_seed(config.draws.winner_seed)),
    );

    let app = with_draw_routes(draw_service, deployment.identity.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        demo_users = args.demo_users,
        admin_token = DEMO_ADMIN_TOKEN,
        seeded_winner_picks = config.draws.winner_seed.is_some(),
        "lucky draw service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
