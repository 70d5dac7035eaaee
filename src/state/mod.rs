mod history;
mod registry;

pub use history::History;
pub use registry::{PassOutcome, Registry, Visit};

use crate::config::RelayConfig;
use crate::sequencer::{Sequencer, SequencerRx};
use std::sync::Mutex;

/// Shared application state
///
/// Registry and history are guarded independently; neither lock is ever
/// taken while holding the other.
pub struct AppState {
    pub config: RelayConfig,
    pub registry: Registry,
    pub history: History,
    /// Producer side of the sequencer, cloned into every read loop
    pub sequencer: Sequencer,
    /// Consumer side, handed to the broadcaster exactly once
    sequencer_rx: Mutex<Option<SequencerRx>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    pub fn with_config(config: RelayConfig) -> Self {
        let (sequencer, rx) = Sequencer::channel();
        Self {
            history: History::new(config.history_limit),
            registry: Registry::new(),
            sequencer,
            sequencer_rx: Mutex::new(Some(rx)),
            config,
        }
    }

    /// Take the consumer side of the sequencer. Returns None after the first call.
    pub fn take_sequencer_rx(&self) -> Option<SequencerRx> {
        self.sequencer_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
