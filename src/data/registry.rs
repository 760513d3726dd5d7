use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::data::Collection;

pub type SharedCollection = Rc<RefCell<Collection>>;

/// Lazily-created collections, cached by resource name.
///
/// Cloning the registry yields another handle to the same set of collections,
/// so every store built from it for a given name shares one backing collection.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    resources: Rc<RefCell<AHashMap<String, SharedCollection>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the collection for `name`, creating it on first use
    pub fn get_resource(&self, name: &str) -> SharedCollection {
        let mut resources = self.resources.borrow_mut();
        if let Some(collection) = resources.get(name) {
            return collection.clone();
        }

        log::debug!("Creating collection '{}'", name);
        let collection = Rc::new(RefCell::new(Collection::new(name)));
        resources.insert(name.to_string(), collection.clone());
        collection
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.resources.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}
