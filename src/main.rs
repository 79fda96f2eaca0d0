use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botkeeper::access::{AccessGate, AccessPolicy, StoreAccessPolicy};
use botkeeper::commands::CommandHandler;
use botkeeper::config::{Config, ConfigError};
use botkeeper::probe::{HealthProbe, HttpHealthProbe};
use botkeeper::restart::{RestartCoordinator, TokenIssuer};
use botkeeper::server::{AppState, build_router, local_health_url, run_keepalive};
use botkeeper::settings::{HttpPageFetcher, Settings};
use botkeeper::shutdown::wait_for_shutdown_signal;
use botkeeper::store::{FileStore, KvStore, StoreError};
use botkeeper::supervisor::Supervisor;
use botkeeper::telegram::{TelegramClient, TelegramNotifier, TelegramSessionFactory};

#[derive(Debug, Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP server task failed: {0}")]
    Server(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botkeeper=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let store: Arc<dyn KvStore> = Arc::new(FileStore::open(&config.store_path).await?);
    let http = reqwest::Client::builder()
        .user_agent(concat!("botkeeper/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let access: Arc<dyn AccessPolicy> =
        Arc::new(StoreAccessPolicy::new(store.clone(), config.admin_id));
    let issuer = Arc::new(TokenIssuer::new(store.clone(), config.base_url.clone()));
    let probe: Arc<dyn HealthProbe> = Arc::new(HttpHealthProbe::new(store.clone(), http.clone()));
    let settings = Settings::new(
        store.clone(),
        access.clone(),
        Arc::new(HttpPageFetcher::new(http.clone())),
    );
    let handler = Arc::new(CommandHandler::new(
        config.bot_username.clone(),
        AccessGate::new(access.clone()),
        issuer.clone(),
        settings,
        probe.clone(),
    ));

    let telegram = TelegramClient::new(http.clone(), &config.bot_token);
    let notifier = Arc::new(TelegramNotifier::new(telegram.clone(), access));
    let supervisor = Supervisor::new(
        TelegramSessionFactory::new(telegram, config.poll_timeout),
        handler,
        notifier.clone(),
        config.lifecycle,
    );
    let coordinator = Arc::new(RestartCoordinator::new(issuer, supervisor.clone(), notifier));
    let app = build_router(AppState::new(coordinator.clone(), store, probe));

    let listener = TcpListener::bind(config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "Listening");

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }
    });
    let keepalive = tokio::spawn(run_keepalive(
        http,
        local_health_url(local_addr),
        config.keepalive_interval,
        shutdown.clone(),
    ));

    if let Err(e) = supervisor.start().await {
        // The server stays up; a restart link is the way back in.
        match coordinator.issue_token().await {
            Ok(issued) => warn!(
                error = %e,
                restart_url = %issued.restart_url(),
                "Initial worker start failed"
            ),
            Err(issue_error) => warn!(
                error = %e,
                %issue_error,
                "Initial worker start failed and no restart link could be issued"
            ),
        }
    }

    let finished = tokio::select! {
        signal = wait_for_shutdown_signal() => {
            match signal {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signals"),
            }
            None
        }
        result = &mut server => {
            error!("HTTP server exited unexpectedly");
            Some(result)
        }
    };

    match supervisor.stop().await {
        Ok(outcome) => info!(?outcome, "Worker stopped"),
        Err(e) => warn!(error = %e, "Worker stop failed"),
    }
    shutdown.cancel();

    if let Err(e) = keepalive.await {
        warn!(error = %e, "Keep-alive task failed");
    }
    let server_result = match finished {
        Some(result) => result,
        None => server.await,
    };
    server_result??;
    info!("Shutdown complete");
    Ok(())
}
