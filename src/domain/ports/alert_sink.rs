use async_trait::async_trait;

use super::errors::DeliveryError;
use crate::domain::models::{Alert, DeliveryChannel};

/// Outbound alert transport (chat, email, pager, ...).
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, channel: &DeliveryChannel, alert: &Alert) -> Result<(), DeliveryError>;
}
