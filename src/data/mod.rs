mod collection;
mod config;
mod constants;
mod dynamic_view;
mod error;
mod notifications;
pub mod query;
pub mod record;
mod registry;
mod store;
mod view;

pub use collection::Collection;
pub use config::StoreConfig;
pub use constants::{op, DEFAULT_ID_ATTR, SURROGATE_KEY};
pub use dynamic_view::{DynamicView, SimpleSort, WherePredicate};
pub use error::Error;
pub use notifications::{
    notification_channel, EventKind, Notification, NotificationReceiver, NotificationSender,
    Notifier, NotifyCallback, NotifyToken, Trigger,
};
pub use query::{Condition, Query};
pub use record::Record;
pub use registry::{CollectionRegistry, SharedCollection};
pub use store::{AddOutcome, EntityStore, UpdateOutcome, UpsertOutcome};
pub use view::{build_search, SortBy, ViewDescriptor};
