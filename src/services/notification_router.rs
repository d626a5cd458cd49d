//! Maps alert priority to a delivery channel and hands the alert to the sink.
//!
//! There is no retry or queuing here: a delivery failure goes straight back
//! to the caller.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::models::{Alert, DeliveryChannel, Priority, UserProfile};
use crate::domain::ports::{AlertSink, DeliveryError};

/// Channel for `priority`, falling back to the profile's default channel.
pub fn route(priority: Priority, profile: &UserProfile) -> DeliveryChannel {
    profile
        .channel_for(priority)
        .unwrap_or_else(|| profile.default_channel())
        .clone()
}

pub struct NotificationRouter {
    sink: Arc<dyn AlertSink>,
    profile: UserProfile,
}

impl NotificationRouter {
    pub fn new(sink: Arc<dyn AlertSink>, profile: UserProfile) -> Self {
        Self { sink, profile }
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn route(&self, priority: Priority) -> DeliveryChannel {
        route(priority, &self.profile)
    }

    /// Route and deliver one alert. Returns the channel used.
    #[instrument(skip(self, alert), fields(worker = %alert.worker_type, priority = %alert.priority), err)]
    pub async fn deliver(&self, alert: &Alert) -> Result<DeliveryChannel, DeliveryError> {
        let channel = self.route(alert.priority);
        self.sink.deliver(&channel, alert).await?;
        debug!(channel = %channel, "Alert delivered");
        Ok(channel)
    }
}
