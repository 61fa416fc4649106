//! Application state shared by every handler.

use cleanreport_core::Config;
use cleanreport_worker::ForwardQueue;

pub struct AppState {
    pub config: Config,
    pub queue: ForwardQueue,
}

impl AppState {
    pub fn new(config: Config, queue: ForwardQueue) -> Self {
        Self { config, queue }
    }
}
