use metrics_exporter_prometheus::PrometheusHandle;
use posting_fulfillment::workflows::fulfillment::{Notification, NotificationSink, NotifyError};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Delivers notifications by logging them. Stands in for the push/email transport.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn emit(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            template = notification.kind.template(),
            posting = %notification.posting_id,
            application = notification.application_id.as_ref().map(|id| id.as_str()),
            "notification dispatched"
        );
        Ok(())
    }
}
