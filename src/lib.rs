pub mod data;

#[cfg(test)]
mod test;

#[doc(hidden)]
pub use serde_json;

pub use data::{
    AddOutcome, Collection, CollectionRegistry, DynamicView, EntityStore, Error, EventKind,
    Notification, NotificationReceiver, NotifyToken, Query, Record, SortBy, StoreConfig, Trigger,
    UpdateOutcome, UpsertOutcome, ViewDescriptor, SURROGATE_KEY,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Create a `Record` from a JSON object literal
///
/// # Example
///
/// ```
/// let task = qstore_rs::record!({ "id": 1, "status": "open" });
/// assert_eq!(task["status"], "open");
/// ```
#[macro_export]
macro_rules! record {
    ({ $($body:tt)* }) => {
        match $crate::serde_json::json!({ $($body)* }) {
            $crate::serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    };
}

/// Create a `Query` from a mongo-style JSON document
///
/// # Example
///
/// ```
/// let query = qstore_rs::query!({ "rank": { "$gte": 2 } }).unwrap();
/// assert!(query.matches(&qstore_rs::record!({ "rank": 3 })));
/// ```
#[macro_export]
macro_rules! query {
    ({ $($body:tt)* }) => {
        $crate::Query::parse(&$crate::serde_json::json!({ $($body)* }))
    };
}

/// Create a `SortBy` for use with `EntityStore::sort`
///
/// ```
/// let by_rank = qstore_rs::sort_by!("rank", desc);
/// assert!(by_rank.is_descending);
/// ```
#[macro_export]
macro_rules! sort_by {
    ($attribute:expr, asc) => {
        $crate::SortBy::asc($attribute)
    };
    ($attribute:expr, desc) => {
        $crate::SortBy::desc($attribute)
    };
    ($attribute:expr) => {
        $crate::SortBy::asc($attribute)
    };
}
