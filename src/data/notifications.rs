use crossbeam::channel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::data::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Add,
    Update,
    SetCollection,
    Destroy,
    DestroyAll,
    ViewRegistered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// The inserted record, surrogate key included
    Add(Record),
    /// The merged record as written back
    Update(Record),
    /// Full collection contents after a bulk sync
    SetCollection(Vec<Record>),
    /// The business key that was requested for removal
    Destroy(Value),
    /// Collection contents after clearing, always empty
    DestroyAll(Vec<Record>),
    /// Tag of the view that was (re)built
    ViewRegistered(String),
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self {
            Notification::Add(_) => EventKind::Add,
            Notification::Update(_) => EventKind::Update,
            Notification::SetCollection(_) => EventKind::SetCollection,
            Notification::Destroy(_) => EventKind::Destroy,
            Notification::DestroyAll(_) => EventKind::DestroyAll,
            Notification::ViewRegistered(_) => EventKind::ViewRegistered,
        }
    }
}

/// Whether a mutation should emit its notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trigger {
    #[default]
    Emit,
    Silent,
}

/// A unique token for a listener registration, used to detach it later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotifyToken(Uuid);

impl NotifyToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for NotifyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type NotifyCallback = Box<dyn FnMut(&Notification)>;

/// Notification sender type for forwarding notifications to a channel
pub type NotificationSender = channel::Sender<Notification>;

/// Notification receiver type for draining a channel subscription
pub type NotificationReceiver = channel::Receiver<Notification>;

/// Create a new notification channel pair
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    channel::unbounded()
}

enum Listener {
    Callback(NotifyCallback),
    Queue(NotificationSender),
}

struct Registration {
    token: NotifyToken,
    kind: EventKind,
    listener: Listener,
}

/// Per-store event emitter.
///
/// Listeners run synchronously, in registration order, inside the call that
/// emitted the notification.
#[derive(Default)]
pub struct Notifier {
    registrations: Vec<Registration>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> NotifyToken
    where
        F: FnMut(&Notification) + 'static,
    {
        self.register(kind, Listener::Callback(Box::new(callback)))
    }

    /// Forward notifications of `kind` into a channel.
    /// The registration is dropped once the receiving side disconnects.
    pub fn on_queue(&mut self, kind: EventKind, sender: NotificationSender) -> NotifyToken {
        self.register(kind, Listener::Queue(sender))
    }

    fn register(&mut self, kind: EventKind, listener: Listener) -> NotifyToken {
        let token = NotifyToken::new();
        self.registrations.push(Registration {
            token,
            kind,
            listener,
        });
        token
    }

    pub fn off(&mut self, token: &NotifyToken) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.token != *token);
        self.registrations.len() != before
    }

    /// Detach every listener of `kind`, returning how many were removed
    pub fn off_kind(&mut self, kind: EventKind) -> usize {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.kind != kind);
        before - self.registrations.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations.iter().filter(|r| r.kind == kind).count()
    }

    pub fn emit(&mut self, notification: &Notification) {
        let kind = notification.kind();
        log::trace!("Emitting {:?} notification", kind);

        self.registrations.retain_mut(|registration| {
            if registration.kind != kind {
                return true;
            }
            match &mut registration.listener {
                Listener::Callback(callback) => {
                    callback(notification);
                    true
                }
                Listener::Queue(sender) => sender.send(notification.clone()).is_ok(),
            }
        });
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}
