use std::sync::Arc;

use notesync_kernel::Kernel;

use crate::config::ServerConfig;

#[derive(Clone)]
pub(crate) struct AppState {
    kernel: Kernel,
    config: Arc<ServerConfig>,
}

impl AppState {
    pub(crate) fn new(kernel: Kernel, config: ServerConfig) -> Self {
        Self {
            kernel,
            config: Arc::new(config),
        }
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
