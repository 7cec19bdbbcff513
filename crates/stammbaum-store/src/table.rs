use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::handle::Handle;
use crate::model::Record;

// ─────────────────────────────────────────────
// Table
// ─────────────────────────────────────────────

/// One category's records, keyed by handle.
///
/// Supplies the store operations a category exposes to the filter engine:
/// enumerate-all-handles, cursor, hierarchy cursor, fetch-by-handle, count.
/// Iteration follows the handle order (a `BTreeMap`), which is the stable
/// store-native order.
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    records: BTreeMap<Handle, R>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self { records: BTreeMap::new() }
    }
}

impl<R: Record> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keyed by the record's own handle, replacing any previous
    /// record under that handle. Returns the handle for convenience.
    pub fn insert(&mut self, record: R) -> Handle {
        let handle = record.handle();
        self.records.insert(handle, record);
        handle
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.records.contains_key(&handle)
    }

    /// Fetch one record. A missing handle is a hard error: a dangling
    /// candidate indicates store corruption, not an empty result.
    pub fn get(&self, handle: Handle) -> Result<&R, StoreError> {
        self.records
            .get(&handle)
            .ok_or(StoreError::NotFound { kind: R::KIND, handle })
    }

    /// Every handle in the category, in store-native order.
    pub fn handles(&self) -> Vec<Handle> {
        self.records.keys().copied().collect()
    }

    /// Iterate all records in store-native order.
    pub fn cursor(&self) -> impl Iterator<Item = (Handle, &R)> {
        self.records.iter().map(|(h, r)| (*h, r))
    }

    /// Iterate all records in hierarchy-consistent order: depth-first,
    /// parents before children, siblings in handle order.
    ///
    /// For flat categories every record is a root and this degenerates to
    /// [`Table::cursor`] order. Records unreachable from a root (cycles in
    /// parent links, a corrupt store) are appended in handle order so the
    /// traversal always covers the whole category.
    pub fn tree_cursor(&self) -> impl Iterator<Item = (Handle, &R)> {
        self.tree_order()
            .into_iter()
            .filter_map(move |h| self.records.get(&h).map(|r| (h, r)))
    }

    fn tree_order(&self) -> Vec<Handle> {
        let mut children: BTreeMap<Handle, Vec<Handle>> = BTreeMap::new();
        let mut roots: Vec<Handle> = Vec::new();
        for (handle, record) in &self.records {
            match record.parent() {
                Some(parent) if self.records.contains_key(&parent) => {
                    children.entry(parent).or_default().push(*handle);
                }
                _ => roots.push(*handle),
            }
        }

        let mut order = Vec::with_capacity(self.records.len());
        let mut stack: Vec<Handle> = roots.into_iter().rev().collect();
        while let Some(handle) = stack.pop() {
            order.push(handle);
            if let Some(kids) = children.remove(&handle) {
                stack.extend(kids.into_iter().rev());
            }
        }

        // Anything still in `children` hangs off an unvisited parent.
        if order.len() < self.records.len() {
            let mut leftover: Vec<Handle> = children.into_values().flatten().collect();
            leftover.sort_unstable();
            order.extend(leftover);
        }
        order
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
