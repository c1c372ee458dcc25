use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::{
    AppointmentQuery, AppointmentRepository, AppointmentScheduler, EntityDirectory, InMemoryAppointmentRepository,
    InMemoryDirectory, SchedulingRules, SupabaseAppointmentRepository, SupabaseDirectory,
};
use doctor_cell::handlers::ScheduleState;
use doctor_cell::{InMemoryScheduleRepository, ScheduleCalendar, ScheduleRepository, SupabaseScheduleRepository};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vet Clinic scheduling API server");

    let config = Arc::new(AppConfig::from_env());
    let (appointments, schedules) = build_state(Arc::clone(&config)).await?;

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(appointments, schedules)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

async fn build_state(config: Arc<AppConfig>) -> anyhow::Result<(AppointmentState, ScheduleState)> {
    let (appointment_repo, schedule_repo, directory): (
        Arc<dyn AppointmentRepository>,
        Arc<dyn ScheduleRepository>,
        Arc<dyn EntityDirectory>,
    ) = match config.storage_backend {
        StorageBackend::Supabase => {
            if !config.is_supabase_configured() {
                anyhow::bail!("STORAGE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_ANON_PUBLIC_KEY");
            }
            info!("Using Supabase storage at {}", config.supabase_url);

            let supabase = Arc::new(SupabaseClient::new(&config));
            (
                Arc::new(SupabaseAppointmentRepository::new(Arc::clone(&supabase))),
                Arc::new(SupabaseScheduleRepository::new(Arc::clone(&supabase))),
                Arc::new(SupabaseDirectory::new(supabase)),
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage");

            let directory = match config.directory_seed_path.as_deref() {
                Some(path) => InMemoryDirectory::from_seed_file(path)
                    .await
                    .with_context(|| format!("failed to load directory seed {}", path))?,
                None => {
                    warn!("DIRECTORY_SEED_PATH not set, every booking will fail with an unknown doctor");
                    InMemoryDirectory::new()
                }
            };
            (
                Arc::new(InMemoryAppointmentRepository::new()),
                Arc::new(InMemoryScheduleRepository::new()),
                Arc::new(directory),
            )
        }
    };

    let rules = SchedulingRules::from_config(&config);
    let calendar = Arc::new(ScheduleCalendar::new(schedule_repo));
    let scheduler = Arc::new(AppointmentScheduler::new(
        Arc::clone(&appointment_repo),
        directory,
        Arc::clone(&calendar),
        rules.clone(),
    ));
    let query = Arc::new(AppointmentQuery::new(appointment_repo, rules.max_page_size));

    Ok((
        AppointmentState { config: Arc::clone(&config), scheduler, query },
        ScheduleState { config, calendar },
    ))
}
