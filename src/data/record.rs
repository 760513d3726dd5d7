use serde_json::Value;

use crate::data::SURROGATE_KEY;

/// A flat, application-defined mapping of fields.
pub type Record = serde_json::Map<String, Value>;

/// Surrogate key assigned by the collection engine, if the record carries one
pub fn surrogate_key(record: &Record) -> Option<u64> {
    record.get(SURROGATE_KEY).and_then(Value::as_u64)
}

pub fn set_surrogate_key(record: &mut Record, key: u64) {
    record.insert(SURROGATE_KEY.to_string(), Value::from(key));
}

/// Value of a field, with JSON `null` treated as absent.
pub fn field<'a>(record: &'a Record, name: &str) -> Option<&'a Value> {
    record.get(name).filter(|value| !value.is_null())
}

/// Overlay `updates` on top of `stale`. Fields from `updates` win on conflict.
pub fn merge(stale: &Record, updates: &Record) -> Record {
    let mut merged = stale.clone();
    for (key, value) in updates {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Iterate application fields, skipping engine metadata.
pub fn app_fields(record: &Record) -> impl Iterator<Item = (&String, &Value)> {
    record.iter().filter(|(key, _)| key.as_str() != SURROGATE_KEY)
}
