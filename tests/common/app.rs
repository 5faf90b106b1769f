use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use vocab_backend::config::{
    Config, ImageConfig, LLMConfig, StorageConfig, StorageMode, WorkerConfig,
};
use vocab_backend::routes::build_router;
use vocab_backend::services::llm::MockCompletionClient;
use vocab_backend::services::storage::memory::MemoryStorage;
use vocab_backend::state::{AppState, Clients};
use vocab_backend::store::Store;

use super::fixtures::{FakeImageApi, OUTPUT_NODE};

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const STORAGE_BASE: &str = "https://cdn.test";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub llm: Arc<MockCompletionClient>,
    pub images: Arc<FakeImageApi>,
    pub storage: Arc<MemoryStorage>,
    _temp_dir: TempDir,
}

pub fn test_config(sled_path: String) -> Config {
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 5000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        jwt_expires_in_hours: 24,
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        cors_origin: "*".to_string(),
        max_upload_bytes: 1024 * 1024,
        worker: WorkerConfig {
            is_leader: false,
            enable_image_sweep: false,
            enable_word_of_day_warmup: false,
        },
        llm: LLMConfig {
            mock: true,
            api_url: String::new(),
            api_key: String::new(),
            model: "test-model".to_string(),
            timeout_secs: 5,
        },
        image: ImageConfig {
            comfyui_url: "http://comfyui.invalid".to_string(),
            workflow_path: None,
            positive_node: "6".to_string(),
            negative_node: "7".to_string(),
            output_node: OUTPUT_NODE.to_string(),
            poll_attempts: 3,
            poll_delay_ms: 1,
            poll_max_delay_ms: 1,
            poll_multiplier: 1.0,
        },
        storage: StorageConfig {
            mode: StorageMode::Memory,
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            public_base_url: STORAGE_BASE.to_string(),
            key_prefix: "images".to_string(),
        },
    }
}

pub async fn spawn_with_images(images: FakeImageApi) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("vocab-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string());

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let llm = Arc::new(MockCompletionClient::new());
    let images = Arc::new(images);
    let storage = Arc::new(MemoryStorage::new(STORAGE_BASE));
    let clients = Clients {
        llm: llm.clone(),
        image_api: images.clone(),
        storage: storage.clone(),
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, clients, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        llm,
        images,
        storage,
        _temp_dir: temp_dir,
    }
}

/// Image jobs finish on the first status check.
pub async fn spawn_test_server() -> TestApp {
    spawn_with_images(FakeImageApi::ready_after(0)).await
}
