use crate::cli::ServeArgs;
use crate::infra::{AppState, FixtureRoster, InMemoryEnrollmentStore, RosterBackend, StoreBackend};
use crate::routes::with_enrollment_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use immersion_enroll::config::AppConfig;
use immersion_enroll::error::AppError;
use immersion_enroll::telemetry;
use immersion_enroll::workflows::enrollment::{
    AdminCredentials, EnrollmentPolicy, EnrollmentService, OpenSheetRoster, RosterDirectory,
    SupabaseEnrollmentStore, TrackCatalog,
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

    telemetry::init_telemetry(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let policy = EnrollmentPolicy {
        capacity_ceiling: config.wizard.track_capacity,
        verify_debounce: config.wizard.debounce(),
        roster_cache_ttl: config.wizard.roster_cache_ttl(),
    };

    let gateway = match &config.roster.url {
        Some(url) => RosterBackend::Sheet(OpenSheetRoster::new(url.clone())),
        None => RosterBackend::Fixture(FixtureRoster),
    };
    let roster = Arc::new(RosterDirectory::new(gateway, policy.roster_cache_ttl));

    let store = Arc::new(match &config.store.supabase {
        Some(supabase) => StoreBackend::Supabase(SupabaseEnrollmentStore::new(
            supabase.url.clone(),
            supabase.anon_key.clone(),
        )),
        None => StoreBackend::InMemory(InMemoryEnrollmentStore::default()),
    });

    let roster_backend = if config.roster.url.is_some() {
        "sheet"
    } else {
        "fixture"
    };
    let store_backend = if config.store.supabase.is_some() {
        "supabase"
    } else {
        "in-memory"
    };
    info!(roster = roster_backend, store = store_backend, "data backends selected");

    let admin = config
        .admin
        .credentials
        .as_ref()
        .map(|configured| AdminCredentials {
            username: configured.username.clone(),
            password: configured.password.clone(),
        });

    let service = Arc::new(EnrollmentService::new(
        roster,
        store,
        TrackCatalog::standard(),
        policy,
        admin,
    ));

    let app = with_enrollment_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "enrollment service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
