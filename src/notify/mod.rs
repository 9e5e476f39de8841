//! Notification sinks for status transitions.
//!
//! The engine publishes short human-readable messages such as
//! `"(nginx.service): service is down"`. Sinks are best-effort: the engine
//! logs a failed publish and carries on.

pub mod telegram;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::NotifyError;

/// Fire-and-forget message sink.
///
/// Implementations must tolerate concurrent `publish` calls from parallel
/// service checks.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short sink name used in logs.
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn publish(&self, message: &str) -> Result<(), NotifyError>;
}

/// Publishes every message to several sinks.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    /// Fan out to `sinks`.
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Number of configured sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink is configured.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn name(&self) -> &str {
        "fanout"
    }

    /// Succeeds if at least one sink accepted the message, or if there are
    /// no sinks at all.
    async fn publish(&self, message: &str) -> Result<(), NotifyError> {
        if self.sinks.is_empty() {
            return Ok(());
        }

        let mut delivered = false;
        let mut last_error = None;
        for sink in &self.sinks {
            match sink.publish(message).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    warn!(sink = sink.name(), error = %e, "notification sink failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !delivered => Err(e),
            _ => Ok(()),
        }
    }
}
