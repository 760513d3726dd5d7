use std::collections::BTreeMap;

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use serde_json::{Number, Value};
use smallvec::SmallVec;

use crate::data::{record, DynamicView, Error, Query, Record, SURROGATE_KEY};
use crate::Result;

/// Hash index from a field value to the surrogate keys holding it.
#[derive(Debug, Default)]
struct HashIndex {
    field: String,
    keys: FxHashMap<String, SmallVec<[u64; 1]>>,
}

impl HashIndex {
    fn new(field: &str) -> Self {
        HashIndex {
            field: field.to_string(),
            keys: FxHashMap::default(),
        }
    }

    fn index_key(value: &Value) -> String {
        match value {
            Value::Number(n) => Self::number_key(n),
            other => other.to_string(),
        }
    }

    // Integers keep every digit; integral floats share their bucket so 1 and 1.0 collide
    fn number_key(n: &Number) -> String {
        if n.is_i64() || n.is_u64() {
            return format!("#{}", n);
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                format!("#{}", f as i64)
            }
            Some(f) => format!("#{}", f),
            None => format!("#{}", n),
        }
    }

    fn insert(&mut self, key: u64, record: &Record) {
        if let Some(value) = record::field(record, &self.field) {
            let keys = self.keys.entry(Self::index_key(value)).or_default();
            if let Err(pos) = keys.binary_search(&key) {
                keys.insert(pos, key);
            }
        }
    }

    fn remove(&mut self, key: u64, record: &Record) {
        let Some(value) = record::field(record, &self.field) else {
            return;
        };
        let index_key = Self::index_key(value);
        if let Some(keys) = self.keys.get_mut(&index_key) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.keys.remove(&index_key);
            }
        }
    }

    fn lookup(&self, value: &Value) -> &[u64] {
        self.keys
            .get(&Self::index_key(value))
            .map(|keys| keys.as_slice())
            .unwrap_or(&[])
    }
}

/// In-memory record collection with surrogate keys and dynamic views.
///
/// Records are kept in surrogate-key order, which is also insertion order.
#[derive(Debug)]
pub struct Collection {
    name: String,
    records: BTreeMap<u64, Record>,
    next_key: u64,
    indexes: Vec<HashIndex>,
    dynamic_views: AHashMap<String, DynamicView>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Collection {
            name: name.into(),
            records: BTreeMap::new(),
            next_key: 1,
            indexes: Vec::new(),
            dynamic_views: AHashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maintain a hash index on `field`. Existing records are indexed immediately.
    pub fn ensure_index(&mut self, field: &str) {
        if field == SURROGATE_KEY || self.indexes.iter().any(|i| i.field == field) {
            return;
        }

        let mut index = HashIndex::new(field);
        for (key, record) in &self.records {
            index.insert(*key, record);
        }
        self.indexes.push(index);
    }

    /// Insert a record and return the stored copy, carrying its new surrogate key.
    ///
    /// A surrogate key already present on `record` is discarded.
    pub fn insert(&mut self, mut record: Record) -> Record {
        let key = self.next_key;
        self.next_key += 1;

        record::set_surrogate_key(&mut record, key);
        for index in self.indexes.iter_mut() {
            index.insert(key, &record);
        }
        self.records.insert(key, record.clone());
        record
    }

    /// Replace the stored record with the same surrogate key.
    pub fn update(&mut self, record: Record) -> Result<Record> {
        let key = record::surrogate_key(&record).ok_or(Error::MissingSurrogateKey)?;
        let stale = self.records.get_mut(&key).ok_or(Error::RecordNotFound(key))?;

        for index in self.indexes.iter_mut() {
            index.remove(key, stale);
            index.insert(key, &record);
        }
        *stale = record.clone();
        Ok(record)
    }

    /// Remove the stored record matching `record`'s surrogate key, if any.
    pub fn remove(&mut self, record: &Record) -> Option<Record> {
        let key = record::surrogate_key(record)?;
        let removed = self.records.remove(&key)?;
        for index in self.indexes.iter_mut() {
            index.remove(key, &removed);
        }
        Some(removed)
    }

    /// Drop every record. Indexes and dynamic views stay registered.
    pub fn remove_data_only(&mut self) {
        self.records.clear();
        for index in self.indexes.iter_mut() {
            index.keys.clear();
        }
    }

    pub fn get(&self, key: u64) -> Option<&Record> {
        self.records.get(&key)
    }

    pub fn find_one(&self, query: &Query) -> Option<&Record> {
        if let Some((field, value)) = query.as_equality() {
            if field == SURROGATE_KEY {
                return value.as_u64().and_then(|key| self.records.get(&key));
            }
            if let Some(index) = self.indexes.iter().find(|i| i.field == field) {
                return index
                    .lookup(value)
                    .iter()
                    .filter_map(|key| self.records.get(key))
                    .find(|r| query.matches(r));
            }
        }

        self.records.values().find(|r| query.matches(r))
    }

    pub fn find(&self, query: &Query) -> Vec<Record> {
        self.records
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect()
    }

    /// Register a fresh view under `name`, replacing any view already there.
    pub fn add_dynamic_view(&mut self, name: &str) -> &mut DynamicView {
        let view = self
            .dynamic_views
            .entry(name.to_string())
            .or_insert_with(|| DynamicView::new(name));
        *view = DynamicView::new(name);
        view
    }

    pub fn remove_dynamic_view(&mut self, name: &str) -> bool {
        self.dynamic_views.remove(name).is_some()
    }

    pub fn get_dynamic_view(&self, name: &str) -> Option<&DynamicView> {
        self.dynamic_views.get(name)
    }

    pub fn get_dynamic_view_mut(&mut self, name: &str) -> Option<&mut DynamicView> {
        self.dynamic_views.get_mut(name)
    }

    /// Materialized data of a registered view
    pub fn view_data(&self, name: &str) -> Option<Vec<Record>> {
        self.dynamic_views
            .get(name)
            .map(|view| view.data(self.records.values()))
    }
}
