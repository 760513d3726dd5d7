use itertools::Itertools;
use smallvec::SmallVec;

use crate::data::{query, Query, Record};

pub type WherePredicate = Box<dyn Fn(&Record) -> bool>;

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSort {
    pub attribute: String,
    pub is_descending: bool,
}

/// A live projection of a collection.
///
/// The view holds no data of its own; `data` evaluates the pipeline against
/// whatever the collection currently stores.
pub struct DynamicView {
    name: String,
    sort: Option<SimpleSort>,
    finds: SmallVec<[Query; 4]>,
    wheres: Vec<WherePredicate>,
}

impl DynamicView {
    pub fn new(name: impl Into<String>) -> Self {
        DynamicView {
            name: name.into(),
            sort: None,
            finds: SmallVec::new(),
            wheres: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the view's sort. Only one sort attribute is kept.
    pub fn apply_simple_sort(&mut self, attribute: &str, is_descending: bool) -> &mut Self {
        self.sort = Some(SimpleSort {
            attribute: attribute.to_string(),
            is_descending,
        });
        self
    }

    /// Add a query clause, AND-combined with those already applied
    pub fn apply_find(&mut self, query: Query) -> &mut Self {
        self.finds.push(query);
        self
    }

    pub fn apply_where<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        self.wheres.push(Box::new(predicate));
        self
    }

    pub fn sort(&self) -> Option<&SimpleSort> {
        self.sort.as_ref()
    }

    pub fn finds(&self) -> &[Query] {
        &self.finds
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.finds.iter().all(|q| q.matches(record)) && self.wheres.iter().all(|w| w(record))
    }

    /// Materialize the view over `records`, given in collection-native order.
    pub fn data<'a, I>(&self, records: I) -> Vec<Record>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let matching = records.into_iter().filter(|r| self.matches(r));

        match &self.sort {
            Some(sort) => matching
                .sorted_by(|a, b| {
                    let ordering = query::compare_field(a, b, &sort.attribute);
                    if sort.is_descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        }
    }
}

impl std::fmt::Debug for DynamicView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicView")
            .field("name", &self.name)
            .field("sort", &self.sort)
            .field("finds", &self.finds)
            .field("wheres", &self.wheres.len())
            .finish()
    }
}
