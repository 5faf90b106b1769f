use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::comfyui::{ImageJobApi, ImageJobSubmitter};
use crate::services::llm::CompletionClient;
use crate::services::poller::JobPoller;
use crate::services::relay::ImageRelay;
use crate::services::storage::ObjectStorage;
use crate::store::Store;

/// Outbound dependencies, built once in `main` (or by tests with fakes).
#[derive(Clone)]
pub struct Clients {
    pub llm: Arc<dyn CompletionClient>,
    pub image_api: Arc<dyn ImageJobApi>,
    pub storage: Arc<dyn ObjectStorage>,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    config: Arc<Config>,
    clients: Clients,
    shutdown_tx: broadcast::Sender<()>,
    cancel: CancellationToken,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        config: &Config,
        clients: Clients,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config.clone()),
            clients,
            shutdown_tx,
            cancel: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_arc(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn llm(&self) -> Arc<dyn CompletionClient> {
        self.clients.llm.clone()
    }

    pub fn image_api(&self) -> Arc<dyn ImageJobApi> {
        self.clients.image_api.clone()
    }

    pub fn storage(&self) -> Arc<dyn ObjectStorage> {
        self.clients.storage.clone()
    }

    pub fn submitter(&self) -> ImageJobSubmitter {
        ImageJobSubmitter::new(self.image_api())
    }

    /// Relay using the configured poll budget.
    pub fn relay(&self) -> ImageRelay {
        let poller = JobPoller::new(
            self.image_api(),
            self.config.image.output_node.clone(),
            self.config.image.poll_config(),
        );
        ImageRelay::new(poller, self.image_api(), self.storage())
    }

    /// Cancelled when the server starts shutting down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown_tx(&self) -> &broadcast::Sender<()> {
        &self.shutdown_tx
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::*;
    use crate::services::llm::MockCompletionClient;
    use crate::services::storage::MemoryStorage;
    use crate::services::comfyui::ComfyUiClient;

    fn state(name: &str) -> (tempfile::TempDir, AppState, broadcast::Sender<()>) {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(tmp.path().join(name).to_str().unwrap()).unwrap());
        let clients = Clients {
            llm: Arc::new(MockCompletionClient::new()),
            image_api: Arc::new(ComfyUiClient::new(&cfg.image).unwrap()),
            storage: Arc::new(MemoryStorage::default()),
        };
        let (tx, _) = broadcast::channel(4);
        (tmp, AppState::new(store, &cfg, clients, tx.clone()), tx)
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let (_tmp, state, tx) = state("state_shutdown.sled");

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn clones_share_cancellation() {
        let (_tmp, state, _tx) = state("state_cancel.sled");
        let clone = state.clone();
        state.cancel_token().cancel();
        assert!(clone.cancel_token().is_cancelled());
    }
}
