use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use elearn_backend::config::{Config, GradingConfig, WorkerConfig};
use elearn_backend::exam::lifecycle::AttemptLifecycle;
use elearn_backend::routes::build_router;
use elearn_backend::state::AppState;
use elearn_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

/// Config is constructed directly instead of via set_var, so parallel
/// tests cannot race on process environment.
pub async fn spawn_test_app_with_grading(grading: GradingConfig) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("elearn-test.sled");

    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        jwt_expires_in_hours: 24,
        cors_origin: "http://localhost:5173".to_string(),
        grading,
        worker: WorkerConfig { is_leader: false },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let lifecycle = Arc::new(AttemptLifecycle::new(store.clone(), config.grading.clone()));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store, lifecycle, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_test_app_with_grading(GradingConfig {
        pass_percentage: 80.0,
        expiry_grace_minutes: 5,
    })
    .await
}
