use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// A named side-channel event pushed to a live UI.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct UiEvent {
    pub name: String,
    pub payload: Value,
}

pub trait EventSink: Send + Sync {
    fn deliver(&self, event: UiEvent) -> Result<(), String>;
}

/// Forwards events into an unbounded channel; never blocks.
pub struct ChannelSink {
    tx: UnboundedSender<UiEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: UiEvent) -> Result<(), String> {
        self.tx
            .send(event)
            .map_err(|err| format!("event channel closed ({})", err.0.name))
    }
}

/// Fire-and-forget handle given to tools. Delivery failures are logged and
/// swallowed so they never change a tool's outcome.
#[derive(Clone, Default)]
pub struct EventEmitter {
    sink: Option<Arc<dyn EventSink>>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    pub fn emit(&self, name: &str, payload: Value) {
        let sink = match &self.sink {
            Some(sink) => sink,
            None => {
                debug!(event = name, "no event sink attached; dropping event");
                return;
            }
        };
        let event = UiEvent {
            name: name.to_string(),
            payload,
        };
        if let Err(err) = sink.deliver(event) {
            warn!(event = name, error = %err, "event delivery failed");
        }
    }
}
