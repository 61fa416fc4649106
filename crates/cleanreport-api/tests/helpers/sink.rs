use async_trait::async_trait;
use cleanreport_core::{ForwardUnit, SinkBackend};
use cleanreport_storage::{Sink, SinkResult};
use std::sync::Mutex;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Sink that holds every call until the gate opens, then records it.
pub struct GatedSink {
    gate: Semaphore,
    delivered: Mutex<Vec<(Uuid, usize, usize)>>,
}

impl GatedSink {
    pub fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(1_000);
    }

    /// `(submission_id, unit_index, image_count)` per completed call.
    pub fn delivered(&self) -> Vec<(Uuid, usize, usize)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for GatedSink {
    async fn store(&self, unit: &ForwardUnit) -> SinkResult<()> {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        self.delivered
            .lock()
            .unwrap()
            .push((unit.submission_id, unit.index, unit.images.len()));
        Ok(())
    }

    fn backend_type(&self) -> SinkBackend {
        SinkBackend::Script
    }
}
