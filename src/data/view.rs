use serde::{Deserialize, Serialize};

use crate::data::{record, Query, Record};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub attribute: String,
    #[serde(rename = "isDescending", default)]
    pub is_descending: bool,
}

impl SortBy {
    pub fn asc(attribute: impl Into<String>) -> Self {
        SortBy {
            attribute: attribute.into(),
            is_descending: false,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        SortBy {
            attribute: attribute.into(),
            is_descending: true,
        }
    }
}

/// Metadata a dynamic view is rebuilt from. Holds no data of its own.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDescriptor {
    #[serde(default)]
    pub filters: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ViewDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, filters: Record) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Merge `filters` into the existing ones. Keys present in both are overwritten.
    pub fn merge_filters(&mut self, filters: &Record) {
        self.filters = record::merge(&self.filters, filters);
    }

    /// One query per filter entry. Null entries produce no clause.
    pub fn filter_clauses(&self) -> Vec<Query> {
        self.filters
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(field, value)| {
                Query::clause(field, value).unwrap_or_else(|e| {
                    log::warn!("Filter on '{}' matched literally: {}", field, e);
                    Query::eq(field.as_str(), value.clone())
                })
            })
            .collect()
    }

    /// Search term when one is set and non-empty
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|term| !term.is_empty())
    }
}

/// Case-insensitive substring match over the JSON text of every application field.
pub fn build_search(term: &str) -> impl Fn(&Record) -> bool + 'static {
    let needle = term.to_lowercase();
    move |record: &Record| {
        record::app_fields(record).any(|(_, value)| value.to_string().to_lowercase().contains(&needle))
    }
}
