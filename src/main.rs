use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use vocab_backend::config::{Config, StorageMode};
use vocab_backend::logging::{init_tracing, LogConfig};
use vocab_backend::routes::build_router;
use vocab_backend::services::comfyui::{ComfyUiClient, ImageJobApi};
use vocab_backend::services::llm::{CompletionClient, MockCompletionClient, OpenAiClient};
use vocab_backend::services::storage::memory::MemoryStorage;
use vocab_backend::services::storage::s3::S3Storage;
use vocab_backend::services::storage::ObjectStorage;
use vocab_backend::state::{AppState, Clients};
use vocab_backend::store::Store;
use vocab_backend::workers::WorkerManager;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&LogConfig::from(&config));
    tracing::info!("Starting vocab-backend");

    let store = Arc::new(Store::open(&config.sled_path)?);
    store.run_migrations()?;

    let clients = build_clients(&config).await?;
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store.clone(), &config, clients, shutdown_tx.clone());

    let worker_handle = if config.worker.is_leader {
        let worker_manager = WorkerManager::new(state.clone(), shutdown_tx.subscribe(), &config.worker);
        Some(tokio::spawn(async move {
            if let Err(e) = worker_manager.start().await {
                tracing::error!(error = %e, "Worker manager failed");
            }
        }))
    } else {
        None
    };

    let cancel = state.cancel_token().clone();
    let app = build_router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone(), cancel));

    if let Err(e) = server.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn build_clients(config: &Config) -> Result<Clients, BoxError> {
    let llm: Arc<dyn CompletionClient> = if config.llm.mock {
        tracing::warn!("LLM_MOCK enabled; definitions are canned");
        Arc::new(MockCompletionClient::new())
    } else {
        Arc::new(OpenAiClient::new(&config.llm)?)
    };

    let image_api: Arc<dyn ImageJobApi> = Arc::new(ComfyUiClient::new(&config.image)?);

    let storage: Arc<dyn ObjectStorage> = match config.storage.mode {
        StorageMode::Memory => {
            tracing::warn!("STORAGE_MODE=memory; uploaded images live only in this process");
            match config.storage.public_base_url.as_str() {
                "" => Arc::new(MemoryStorage::default()),
                base => Arc::new(MemoryStorage::new(base)),
            }
        }
        StorageMode::S3 => Arc::new(S3Storage::new(&config.storage).await?),
    };

    Ok(Clients {
        llm,
        image_api,
        storage,
    })
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>, cancel: CancellationToken) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
    let _ = shutdown_tx.send(());
}
