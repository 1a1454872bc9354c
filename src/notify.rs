// src/notify.rs
//! User-visible notifications ("toasts"). Fire-and-forget: nothing in the
//! core reads a return value from a notifier.

use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Serialize, Clone, Debug)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    pub at: DateTime<Utc>,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NotificationKind);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        match kind {
            NotificationKind::Success => tracing::info!("notify: {}", message),
            NotificationKind::Error => tracing::warn!("notify: {}", message),
        }
    }
}

/// Keeps the most recent notifications until the UI drains them.
pub struct QueueNotifier {
    capacity: usize,
    items: Mutex<VecDeque<Notification>>,
}

impl QueueNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn drain(&self) -> Vec<Notification> {
        match self.items.lock() {
            Ok(mut items) => items.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl Notifier for QueueNotifier {
    fn notify(&self, message: &str, kind: NotificationKind) {
        LogNotifier.notify(message, kind);
        let notification = Notification {
            message: message.to_string(),
            kind,
            at: Utc::now(),
        };
        let mut items = match self.items.lock() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        };
        if items.len() == self.capacity {
            items.pop_front();
        }
        items.push_back(notification);
    }
}

/// Turn an operation result into a notification and pass it through.
/// Internal failures are shown as `internal_failure` rather than their detail.
pub(crate) fn report<T>(
    notifier: &dyn Notifier,
    result: Result<T, AppError>,
    success: impl FnOnce(&T) -> String,
    internal_failure: &str,
) -> Result<T, AppError> {
    match &result {
        Ok(value) => notifier.notify(&success(value), NotificationKind::Success),
        Err(e) if e.status().is_server_error() => {
            tracing::error!("{}: {}", internal_failure, e);
            notifier.notify(internal_failure, NotificationKind::Error);
        }
        Err(e) => notifier.notify(&e.to_string(), NotificationKind::Error),
    }
    result
}
