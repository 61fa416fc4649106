//! Test helpers: build the relay router around a controllable sink.
//!
//! Run from workspace root: `cargo test -p cleanreport-api`.

pub mod fixtures;
pub mod sink;

use axum_test::TestServer;
use cleanreport_api::setup::{build_state, routes};
use cleanreport_api::AppState;
use cleanreport_core::{Config, ForwardMode, RelayConfig};
use cleanreport_worker::{
    ForwardQueue, ForwardQueueConfig, ForwardStatus, MemoryOutbox, StatusStore,
};
use sink::GatedSink;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Test application: server plus handles on the sink and state.
pub struct TestApp {
    pub server: TestServer,
    pub sink: Arc<GatedSink>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Poll the status endpoint until the submission reaches a terminal state.
    pub async fn wait_for_terminal(&self, submission_id: Uuid) -> ForwardStatus {
        for _ in 0..200 {
            if let Some(status) = self.state.queue.status(&submission_id) {
                if status.is_terminal() {
                    return status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("submission {} never reached a terminal state", submission_id);
    }
}

pub fn test_relay_config(mode: ForwardMode) -> RelayConfig {
    RelayConfig {
        forward_mode: mode,
        forward_pace_ms: 0,
        forward_max_retries: 0,
        sink_timeout_secs: 5,
        ..RelayConfig::default()
    }
}

fn server_for(config: &Config, state: Arc<AppState>) -> TestServer {
    let app = routes::setup_routes(config, state).expect("Failed to build routes");
    TestServer::new(app.into_make_service()).expect("Failed to create test server")
}

/// Relay whose sink blocks until [`GatedSink::open`] is called.
pub async fn setup_test_app(mode: ForwardMode) -> TestApp {
    setup_test_app_with(mode, |_| {}).await
}

/// Like [`setup_test_app`], with `customize` applied to the relay config first.
pub async fn setup_test_app_with(mode: ForwardMode, customize: impl FnOnce(&mut RelayConfig)) -> TestApp {
    let mut relay = test_relay_config(mode);
    customize(&mut relay);
    let config = Config::new(relay);
    let sink = Arc::new(GatedSink::closed());
    let state = build_state(config.clone(), sink.clone(), Arc::new(MemoryOutbox::new()));
    let server = server_for(&config, state.clone());

    TestApp {
        server,
        sink,
        state,
    }
}

/// Relay with no forward worker and a queue of `capacity` jobs.
pub async fn setup_saturated_app(capacity: usize) -> TestApp {
    let config = Config::new(RelayConfig {
        forward_queue_size: capacity,
        ..RelayConfig::default()
    });
    let queue = ForwardQueue::new_no_worker(
        Arc::new(MemoryOutbox::new()),
        StatusStore::new(16),
        ForwardQueueConfig::from_config(&config),
    );
    let state = Arc::new(AppState::new(config.clone(), queue));
    let server = server_for(&config, state.clone());

    TestApp {
        server,
        sink: Arc::new(GatedSink::closed()),
        state,
    }
}
