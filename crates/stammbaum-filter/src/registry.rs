use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use stammbaum_store::Record;

use crate::filter::Filter;

// ─────────────────────────────────────────────
// FilterRegistry
// ─────────────────────────────────────────────

/// The named filters of one record category.
///
/// Filter names are unique within a category; the category itself is the
/// type parameter, so a registry can only hand out filters of the kind the
/// caller scans. Rules that delegate to another filter resolve it here, and
/// the optimizer resolves the same shared instance — which is why entries
/// are `Rc<RefCell<…>>`: nested preparation must be observable through
/// every path that reaches the filter. The engine is single-threaded, so
/// re-entrant borrows only occur on cyclic references, which the resolution
/// guard reports as an error before they can panic.
pub struct FilterRegistry<R: Record> {
    filters: HashMap<String, Rc<RefCell<Filter<R>>>>,
}

impl<R: Record> Default for FilterRegistry<R> {
    fn default() -> Self {
        Self { filters: HashMap::new() }
    }
}

impl<R: Record> FilterRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the filter's own name, replacing any previous filter
    /// of that name. Returns the shared handle.
    pub fn insert(&mut self, filter: Filter<R>) -> Rc<RefCell<Filter<R>>> {
        let name = filter.name().to_string();
        let shared = Rc::new(RefCell::new(filter));
        self.filters.insert(name, Rc::clone(&shared));
        shared
    }

    pub fn get(&self, name: &str) -> Option<Rc<RefCell<Filter<R>>>> {
        self.filters.get(name).map(Rc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Rc<RefCell<Filter<R>>>> {
        self.filters.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<R: Record> std::fmt::Debug for FilterRegistry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("names", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}
