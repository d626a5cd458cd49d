//! Alert sink adapters.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::domain::models::{Alert, DeliveryChannel, RuleId};
use crate::domain::ports::{AlertSink, DeliveryError};

/// Delivers alerts by emitting a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn deliver(&self, channel: &DeliveryChannel, alert: &Alert) -> Result<(), DeliveryError> {
        info!(
            channel = %channel,
            worker = %alert.worker_type,
            priority = %alert.priority,
            rule_id = alert.rule_id.as_ref().map_or("digest", RuleId::as_str),
            title = %alert.title,
            "Alert delivered"
        );
        Ok(())
    }
}

/// Records every delivery; optionally rejects them all.
#[derive(Debug, Default)]
pub struct InMemoryAlertSink {
    delivered: Mutex<Vec<(DeliveryChannel, Alert)>>,
    reject: bool,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails.
    pub fn rejecting() -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn delivered(&self) -> Vec<(DeliveryChannel, Alert)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn deliver(&self, channel: &DeliveryChannel, alert: &Alert) -> Result<(), DeliveryError> {
        if self.reject {
            return Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                reason: "sink configured to reject".to_string(),
            });
        }
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel.clone(), alert.clone()));
        Ok(())
    }
}
