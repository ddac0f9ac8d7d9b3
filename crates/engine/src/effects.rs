//! Side effects emitted while a command applies.
//!
//! Plugins never print; they emit named effects into the transaction. The
//! model delivers them to the host callbacks only after the transaction
//! commits, and drops them when it rolls back.

use serde::{Deserialize, Serialize};

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Warning,
    Error,
}

/// Payload of the `notifyUI` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub sticky: bool,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: NotificationKind::Info, sticky: false }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: NotificationKind::Warning, sticky: false }
    }

    pub fn error(text: impl Into<String>, sticky: bool) -> Self {
        Self { text: text.into(), kind: NotificationKind::Error, sticky }
    }
}

/// Effects collected during one transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Notification),
}

/// Callback for the `notifyUI` channel.
pub type NotifyCallback = Box<dyn FnMut(&Notification)>;

/// Callback for the confirmation channel. Returns true to proceed.
pub type ConfirmCallback = Box<dyn FnMut(&str) -> bool>;

/// Simple notification collector for testing and headless hosts.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use cellgrid_engine::effects::EffectCollector;
///
/// let collector = Rc::new(RefCell::new(EffectCollector::new()));
/// let sink = EffectCollector::sink(&collector);
/// # drop(sink);
/// assert!(collector.borrow().is_empty());
/// ```
#[derive(Default, Debug)]
pub struct EffectCollector {
    notifications: Vec<Notification>,
}

impl EffectCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// A `notifyUI` callback that appends into a shared collector.
    pub fn sink(shared: &std::rc::Rc<std::cell::RefCell<Self>>) -> NotifyCallback {
        let shared = std::rc::Rc::clone(shared);
        Box::new(move |n: &Notification| shared.borrow_mut().push(n.clone()))
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn texts(&self) -> Vec<&str> {
        self.notifications.iter().map(|n| n.text.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.notifications.clear();
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}
