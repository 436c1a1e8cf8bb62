//! Provider data structure passed to resources and data sources

use crate::api::Client;
use std::sync::Arc;
use std::time::Duration;
use tfplug::mutexkv::MutexKV;

#[derive(Clone)]
pub struct NimbusProviderData {
    pub client: Arc<Client>,
    /// Serializes changes to shared parents (policies, gateways, instances)
    pub locks: MutexKV,
    pub polling: Polling,
}

impl NimbusProviderData {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
            locks: MutexKV::global().clone(),
            polling: Polling::Standard,
        }
    }

    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_locks(mut self, locks: MutexKV) -> Self {
        self.locks = locks;
        self
    }
}

/// How aggressively status is polled after a mutating call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polling {
    /// The per-call-site delay and interval
    #[default]
    Standard,
    /// No initial delay and a short fixed interval, for mocked APIs
    Immediate,
}

impl Polling {
    pub(crate) fn delay(&self, standard: Duration) -> Duration {
        match self {
            Polling::Standard => standard,
            Polling::Immediate => Duration::ZERO,
        }
    }

    pub(crate) fn interval(&self, standard: Duration) -> Duration {
        match self {
            Polling::Standard => standard,
            Polling::Immediate => Duration::from_millis(10),
        }
    }
}
