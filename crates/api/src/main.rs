use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use infergate_core::readiness::ReadinessGate;
use infergate_runner::command::CommandBackend;
use infergate_worker::admission::AdmissionController;
use infergate_worker::backend::{spawn_initialization, InferenceBackend};
use infergate_worker::executor::JobExecutor;
use infergate_worker::facade::InferenceFacade;
use infergate_worker::supervisor::TimeoutSupervisor;
use infergate_worker::workspace::DirScratchSpace;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use infergate_api::config::ServerConfig;
use infergate_api::router::build_app_router;
use infergate_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "infergate_api=debug,infergate_worker=debug,infergate_runner=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    tracing::info!(
        model = %config.model.id,
        workers = config.executor.workers,
        permits = config.executor.permits,
        job_timeout_secs = config.executor.job_timeout.as_secs(),
        timeout_policy = %config.executor.timeout_policy,
        scratch_root = %config.executor.scratch_root.display(),
        "Loaded executor configuration",
    );

    // --- Backend ---
    let backend: Arc<dyn InferenceBackend> = Arc::new(CommandBackend::new(config.runner.clone()));
    let gate = Arc::new(ReadinessGate::new());

    // --- Executor ---
    let admission = Arc::new(
        AdmissionController::new(config.executor.permits).expect("Invalid EXECUTOR_PERMITS"),
    );
    let scratch = Arc::new(DirScratchSpace::new(
        config.executor.scratch_root.clone(),
        config.executor.scratch_prefix.clone(),
    ));
    let executor = Arc::new(
        JobExecutor::start(
            config.executor.workers,
            Arc::clone(&backend),
            admission,
            scratch,
        )
        .expect("Failed to start job executor"),
    );
    let supervisor =
        TimeoutSupervisor::new(config.executor.job_timeout, config.executor.timeout_policy);

    let facade = Arc::new(InferenceFacade::new(
        Arc::clone(&gate),
        Arc::clone(&executor),
        supervisor,
        config.model.alias.clone(),
    ));

    // The server accepts connections while the backend loads; requests get
    // 503 until the gate opens. A failed load is fatal.
    let init = spawn_initialization(backend, gate);
    tokio::spawn(async move {
        match init.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, kind = e.kind(), "Backend initialization failed");
                std::process::exit(1);
            }
            Err(e) => {
                tracing::error!(error = %e, "Backend initialization task panicked");
                std::process::exit(1);
            }
        }
    });

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        facade,
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining jobs");
    let drained = executor
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    tracing::info!(drained, "Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
