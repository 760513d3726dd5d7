use ahash::AHashMap;
use serde_json::Value;

use crate::data::{
    build_search, notification_channel, record, CollectionRegistry, EventKind, Notification,
    NotificationReceiver, Notifier, NotifyToken, Query, Record, SharedCollection, SortBy,
    StoreConfig, Trigger, ViewDescriptor, SURROGATE_KEY,
};
use crate::data::Error;
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Added(Record),
    /// A record with the same identity is already stored; nothing was written
    AlreadyExists(Record),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Record),
    NotFound,
    /// The merged business key is held by another record; nothing was written
    Conflict(Record),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(Record),
    Updated(Record),
    /// The merged business key is held by another record; nothing was written
    Conflict(Record),
    /// The engine refused the write; carries the record as still stored
    Unchanged(Record),
}

impl UpsertOutcome {
    pub fn record(&self) -> &Record {
        match self {
            UpsertOutcome::Inserted(record)
            | UpsertOutcome::Updated(record)
            | UpsertOutcome::Conflict(record)
            | UpsertOutcome::Unchanged(record) => record,
        }
    }
}

/// Why a merged write was not applied
enum WriteError {
    /// Another record already holds the merged business key
    Conflict(Record),
    Engine(Error),
}

/// CRUD, dynamic views and change notifications for one resource type.
///
/// The backing collection comes from a [`CollectionRegistry`] and is shared with
/// every other store built for the same name from that registry. View
/// descriptors and listeners belong to this store alone.
#[derive(Debug)]
pub struct EntityStore {
    config: StoreConfig,
    collection: SharedCollection,
    dynamic_views: AHashMap<String, ViewDescriptor>,
    notifier: Notifier,
}

impl EntityStore {
    pub fn new(registry: &CollectionRegistry, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let collection = registry.get_resource(&config.name);
        collection.borrow_mut().ensure_index(&config.id_attr);

        Ok(EntityStore {
            config,
            collection,
            dynamic_views: AHashMap::new(),
            notifier: Notifier::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn id_attr(&self) -> &str {
        &self.config.id_attr
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.collection.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.borrow().is_empty()
    }

    /// Build the lookup query for `object`: surrogate key first, then business key.
    pub fn entity_query(&self, object: &Record) -> Option<Query> {
        if let Some(key) = record::surrogate_key(object) {
            return Some(Query::eq(SURROGATE_KEY, key));
        }
        self.business_key_query(object)
    }

    fn business_key_query(&self, object: &Record) -> Option<Query> {
        record::field(object, self.id_attr()).map(|id| Query::eq(self.id_attr(), id.clone()))
    }

    /// Find the stored record `object` refers to.
    ///
    /// A surrogate key that no longer resolves falls through to the business
    /// key, so a record can always be reached through either.
    pub fn resolve(&self, object: &Record) -> Option<Record> {
        let collection = self.collection.borrow();
        let by_surrogate = record::surrogate_key(object).and_then(|key| collection.get(key));

        let found = by_surrogate
            .or_else(|| {
                self.business_key_query(object)
                    .and_then(|query| collection.find_one(&query))
            })
            .cloned();
        found
    }

    pub fn add(&mut self, object: Record) -> AddOutcome {
        self.add_with(object, Trigger::Emit)
    }

    pub fn add_with(&mut self, object: Record, trigger: Trigger) -> AddOutcome {
        if let Some(existing) = self.resolve(&object) {
            log::warn!("{}: trying to add an already existing record", self.name());
            return AddOutcome::AlreadyExists(existing);
        }

        let inserted = self.collection.borrow_mut().insert(object);
        self.emit(trigger, |_| Notification::Add(inserted.clone()));
        AddOutcome::Added(inserted)
    }

    pub fn update(&mut self, updates: Record) -> UpdateOutcome {
        self.update_with(updates, Trigger::Emit)
    }

    pub fn update_with(&mut self, updates: Record, trigger: Trigger) -> UpdateOutcome {
        let Some(stale) = self.resolve(&updates) else {
            log::warn!("{}: trying to update a missing record", self.name());
            return UpdateOutcome::NotFound;
        };

        match self.write_merged(&stale, &updates) {
            Ok(updated) => {
                self.emit(trigger, |_| Notification::Update(updated.clone()));
                UpdateOutcome::Updated(updated)
            }
            Err(WriteError::Conflict(holder)) => {
                log::warn!("{}: update would duplicate an existing business key", self.name());
                UpdateOutcome::Conflict(holder)
            }
            Err(WriteError::Engine(e)) => {
                log::warn!("{}: update failed: {}", self.name(), e);
                UpdateOutcome::NotFound
            }
        }
    }

    fn write_merged(
        &mut self,
        stale: &Record,
        updates: &Record,
    ) -> std::result::Result<Record, WriteError> {
        let mut merged = record::merge(stale, updates);
        let key = record::surrogate_key(stale);
        if let Some(key) = key {
            record::set_surrogate_key(&mut merged, key);
        }

        if let Some(holder) = self.key_holder(&merged) {
            if record::surrogate_key(&holder) != key {
                return Err(WriteError::Conflict(holder));
            }
        }

        self.collection
            .borrow_mut()
            .update(merged)
            .map_err(WriteError::Engine)
    }

    /// The stored record holding `object`'s business key, if any
    fn key_holder(&self, object: &Record) -> Option<Record> {
        let query = self.business_key_query(object)?;
        let found = self.collection.borrow().find_one(&query).cloned();
        found
    }

    /// Insert or update without emitting. Meant for silent bulk synchronization.
    pub fn set_object(&mut self, object: Record) -> UpsertOutcome {
        self.set_object_with(object, Trigger::Silent)
    }

    pub fn set_object_with(&mut self, object: Record, trigger: Trigger) -> UpsertOutcome {
        let outcome = match self.resolve(&object) {
            Some(stale) => match self.write_merged(&stale, &object) {
                Ok(updated) => UpsertOutcome::Updated(updated),
                Err(WriteError::Conflict(holder)) => {
                    log::warn!("{}: upsert would duplicate an existing business key", self.name());
                    return UpsertOutcome::Conflict(holder);
                }
                Err(WriteError::Engine(e)) => {
                    log::warn!("{}: upsert failed: {}", self.name(), e);
                    return UpsertOutcome::Unchanged(stale);
                }
            },
            None => UpsertOutcome::Inserted(self.collection.borrow_mut().insert(object)),
        };

        self.emit(trigger, |_| match &outcome {
            UpsertOutcome::Inserted(record) => Notification::Add(record.clone()),
            _ => Notification::Update(outcome.record().clone()),
        });
        outcome
    }

    /// Upsert every record, then emit a single `SetCollection` notification.
    pub fn set_collection<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Record>,
    {
        self.set_collection_with(records, Trigger::Emit)
    }

    pub fn set_collection_with<I>(&mut self, records: I, trigger: Trigger)
    where
        I: IntoIterator<Item = Record>,
    {
        for object in records {
            match self.resolve(&object) {
                Some(stale) => match self.write_merged(&stale, &object) {
                    Ok(_) => {}
                    Err(WriteError::Conflict(_)) => {
                        log::warn!("{}: skipped record with a duplicate business key", self.name());
                    }
                    Err(WriteError::Engine(e)) => {
                        log::warn!("{}: skipped record during sync: {}", self.name(), e);
                    }
                },
                None => {
                    self.collection.borrow_mut().insert(object);
                }
            }
        }

        self.emit(trigger, |store| {
            Notification::SetCollection(store.get_collection(None))
        });
    }

    /// Remove the record with business key `id`. Removing nothing is not an error.
    pub fn destroy(&mut self, id: impl Into<Value>) -> Option<Record> {
        self.destroy_with(id, Trigger::Emit)
    }

    pub fn destroy_with(&mut self, id: impl Into<Value>, trigger: Trigger) -> Option<Record> {
        let id = id.into();
        let removed = self
            .get(id.clone())
            .and_then(|stored| self.collection.borrow_mut().remove(&stored));

        self.emit(trigger, |_| Notification::Destroy(id));
        removed
    }

    /// Remove every record. Views and their descriptors are kept.
    pub fn destroy_all(&mut self) {
        self.destroy_all_with(Trigger::Emit)
    }

    pub fn destroy_all_with(&mut self, trigger: Trigger) {
        self.collection.borrow_mut().remove_data_only();
        self.emit(trigger, |store| {
            Notification::DestroyAll(store.get_collection(None))
        });
    }

    /// Look up a record by business key
    pub fn get(&self, id: impl Into<Value>) -> Option<Record> {
        let mut probe = Record::new();
        probe.insert(self.id_attr().to_string(), id.into());
        let query = self.business_key_query(&probe)?;
        let found = self.collection.borrow().find_one(&query).cloned();
        found
    }

    pub fn find(&self, query: &Query) -> Vec<Record> {
        self.collection.borrow().find(query)
    }

    /// Parse a mongo-style query document and run it
    pub fn find_document(&self, document: &Value) -> Result<Vec<Record>> {
        Ok(self.find(&Query::parse(document)?))
    }

    /// All records without a tag, otherwise the data of the named view.
    /// An unregistered tag yields an empty result.
    pub fn get_collection(&self, tag: Option<&str>) -> Vec<Record> {
        let collection = self.collection.borrow();
        match tag {
            Some(tag) => collection.view_data(tag).unwrap_or_default(),
            None => collection.find(&Query::All),
        }
    }

    fn ensure_descriptor(&mut self, tag: &str) -> &mut ViewDescriptor {
        self.dynamic_views.entry(tag.to_string()).or_default()
    }

    fn rebuild_from_descriptor(&mut self, tag: &str) {
        let params = self.dynamic_views.get(tag).cloned().unwrap_or_default();
        self.register_view(tag, Some(&params));
    }

    /// Merge `filter_query` into the view's filters and rebuild it.
    pub fn filter(&mut self, tag: &str, filter_query: &Record) {
        self.ensure_descriptor(tag).merge_filters(filter_query);
        self.rebuild_from_descriptor(tag);
    }

    /// Replace the view's search term and rebuild it.
    pub fn search(&mut self, tag: &str, search_query: &str) {
        self.ensure_descriptor(tag).search = Some(search_query.to_string());
        self.rebuild_from_descriptor(tag);
    }

    /// Replace the view's sort and rebuild it. `None` restores native order.
    pub fn sort(&mut self, tag: &str, sort_by: Option<SortBy>) {
        self.ensure_descriptor(tag).sort_by = sort_by;
        self.rebuild_from_descriptor(tag);
    }

    /// Drop the live view. With `reregister`, a bare view takes its place.
    /// The descriptor is left as it was.
    pub fn reset_view(&mut self, tag: &str, reregister: bool) {
        self.collection.borrow_mut().remove_dynamic_view(tag);
        if reregister {
            self.register_view(tag, None);
        }
    }

    /// Discard any live view under `tag` and build a new one from `params`,
    /// applying sort, then filters, then search.
    pub fn register_view(&mut self, tag: &str, params: Option<&ViewDescriptor>) {
        {
            let mut collection = self.collection.borrow_mut();
            collection.remove_dynamic_view(tag);
            let view = collection.add_dynamic_view(tag);

            if let Some(params) = params {
                if let Some(sort_by) = &params.sort_by {
                    view.apply_simple_sort(&sort_by.attribute, sort_by.is_descending);
                }
                for clause in params.filter_clauses() {
                    view.apply_find(clause);
                }
                if let Some(term) = params.search_term() {
                    view.apply_where(build_search(term));
                }
            }
        }

        log::debug!("{}: registered view '{}'", self.name(), tag);
        self.emit(Trigger::Emit, |_| Notification::ViewRegistered(tag.to_string()));
    }

    /// Adopt a previously saved descriptor for `tag` and build its view
    pub fn restore_view(&mut self, tag: &str, descriptor: ViewDescriptor) {
        self.dynamic_views.insert(tag.to_string(), descriptor);
        self.rebuild_from_descriptor(tag);
    }

    pub fn view_descriptor(&self, tag: &str) -> Option<&ViewDescriptor> {
        self.dynamic_views.get(tag)
    }

    pub fn view_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.dynamic_views.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> NotifyToken
    where
        F: FnMut(&Notification) + 'static,
    {
        self.notifier.on(kind, callback)
    }

    pub fn off(&mut self, token: &NotifyToken) -> bool {
        self.notifier.off(token)
    }

    pub fn off_kind(&mut self, kind: EventKind) -> usize {
        self.notifier.off_kind(kind)
    }

    /// Receive notifications of `kind` through a channel
    pub fn subscribe_queue(&mut self, kind: EventKind) -> NotificationReceiver {
        let (sender, receiver) = notification_channel();
        self.notifier.on_queue(kind, sender);
        receiver
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.notifier.listener_count(kind)
    }

    fn emit<F>(&mut self, trigger: Trigger, build: F)
    where
        F: FnOnce(&Self) -> Notification,
    {
        if trigger == Trigger::Silent {
            return;
        }
        let notification = build(self);
        self.notifier.emit(&notification);
    }
}
