//! Log-backed and disabled adapters.
//!
//! Hosts without a live-status surface or notification service (the CLI,
//! headless runs) route mirror traffic into `tracing` instead.

use tracing::info;

use super::traits::{CompletionAlert, MirrorContent, NotificationScheduler, StatusMirror};
use crate::error::AdapterError;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogStatusMirror;

impl StatusMirror for LogStatusMirror {
    fn start(&self, content: &MirrorContent) -> Result<(), AdapterError> {
        info!(
            kind = %content.kind,
            remaining_secs = content.remaining_secs,
            total_secs = content.total_planned_secs,
            label = content.label.as_deref().unwrap_or(""),
            "live status started"
        );
        Ok(())
    }

    fn update(&self, remaining_secs: i64) -> Result<(), AdapterError> {
        tracing::trace!(remaining_secs, "live status updated");
        Ok(())
    }

    fn pause(&self) -> Result<(), AdapterError> {
        info!("live status paused");
        Ok(())
    }

    fn resume_with_kind(&self, content: &MirrorContent) -> Result<(), AdapterError> {
        info!(
            kind = %content.kind,
            remaining_secs = content.remaining_secs,
            "live status resumed"
        );
        Ok(())
    }

    fn end(&self, completed: bool) -> Result<(), AdapterError> {
        info!(completed, "live status ended");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationScheduler;

impl NotificationScheduler for LogNotificationScheduler {
    fn schedule_completion(&self, alert: &CompletionAlert) -> Result<(), AdapterError> {
        info!(
            key = %alert.key,
            kind = %alert.kind,
            fire_at = %alert.fire_at.to_rfc3339(),
            "completion alert scheduled"
        );
        Ok(())
    }

    fn cancel_pending(&self) -> Result<(), AdapterError> {
        info!("completion alert cancelled");
        Ok(())
    }
}

/// Adapter that accepts and drops everything, for surfaces turned off in config.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl StatusMirror for Disabled {
    fn start(&self, _content: &MirrorContent) -> Result<(), AdapterError> {
        Ok(())
    }

    fn update(&self, _remaining_secs: i64) -> Result<(), AdapterError> {
        Ok(())
    }

    fn pause(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn resume_with_kind(&self, _content: &MirrorContent) -> Result<(), AdapterError> {
        Ok(())
    }

    fn end(&self, _completed: bool) -> Result<(), AdapterError> {
        Ok(())
    }
}

impl NotificationScheduler for Disabled {
    fn schedule_completion(&self, _alert: &CompletionAlert) -> Result<(), AdapterError> {
        Ok(())
    }

    fn cancel_pending(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}
