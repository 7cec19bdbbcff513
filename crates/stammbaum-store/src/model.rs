use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::store::Store;
use crate::table::Table;

// ─────────────────────────────────────────────
// RecordKind
// ─────────────────────────────────────────────

/// The nine record categories the store is partitioned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Person,
    Family,
    Event,
    Place,
    Source,
    Citation,
    Media,
    Repository,
    Note,
}

impl RecordKind {
    pub const ALL: [RecordKind; 9] = [
        RecordKind::Person,
        RecordKind::Family,
        RecordKind::Event,
        RecordKind::Place,
        RecordKind::Source,
        RecordKind::Citation,
        RecordKind::Media,
        RecordKind::Repository,
        RecordKind::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Person => "person",
            RecordKind::Family => "family",
            RecordKind::Event => "event",
            RecordKind::Place => "place",
            RecordKind::Source => "source",
            RecordKind::Citation => "citation",
            RecordKind::Media => "media",
            RecordKind::Repository => "repository",
            RecordKind::Note => "note",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────
// Record trait
// ─────────────────────────────────────────────

/// Behavior shared by every stored record, and the per-category binding to
/// the table inside [`Store`] that holds records of that type.
///
/// One generic [`Table`] plus this binding replaces nine parallel
/// per-category access layers: the control flow that enumerates, cursors,
/// fetches, and counts records is written once.
pub trait Record: Clone + std::fmt::Debug {
    const KIND: RecordKind;

    /// Store-assigned identity.
    fn handle(&self) -> Handle;

    /// Human-facing record id (e.g. `"I0042"`). Distinct from the handle.
    fn id(&self) -> &str;

    /// Unix timestamp (seconds) of the last change.
    fn change(&self) -> i64;

    /// Enclosing record, for categories that form a hierarchy.
    /// Flat categories return `None` for every record.
    fn parent(&self) -> Option<Handle> {
        None
    }

    /// The category table inside `store` holding records of this type.
    fn table(store: &Store) -> &Table<Self>;
}

/// Unix timestamp (seconds) used as the default `change` value.
fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────
// Person
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Unknown,
}

impl Default for Gender {
    fn default() -> Self {
        Self::Unknown
    }
}

/// One name a person is known by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub given: String,
    pub surname: String,
}

impl Name {
    pub fn new(given: impl Into<String>, surname: impl Into<String>) -> Self {
        Self { given: given.into(), surname: surname.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub handle: Handle,
    pub id: String,
    pub name: Name,
    pub alternate_names: Vec<Name>,
    pub gender: Gender,
    /// Families this person belongs to as a child.
    pub parent_families: Vec<Handle>,
    /// Families this person belongs to as a spouse.
    pub families: Vec<Handle>,
    pub event_refs: Vec<Handle>,
    pub note_refs: Vec<Handle>,
    /// Arbitrary key → value attributes.
    pub attributes: HashMap<String, serde_json::Value>,
    pub change: i64,
}

impl Person {
    pub fn new(id: impl Into<String>, name: Name, gender: Gender) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            name,
            alternate_names: Vec::new(),
            gender,
            parent_families: Vec::new(),
            families: Vec::new(),
            event_refs: Vec::new(),
            note_refs: Vec::new(),
            attributes: HashMap::new(),
            change: now_unix(),
        }
    }
}

// ─────────────────────────────────────────────
// Family
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub handle: Handle,
    pub id: String,
    pub father: Option<Handle>,
    pub mother: Option<Handle>,
    pub children: Vec<Handle>,
    pub event_refs: Vec<Handle>,
    pub change: i64,
}

impl Family {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            father: None,
            mother: None,
            children: Vec::new(),
            event_refs: Vec::new(),
            change: now_unix(),
        }
    }
}

// ─────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub handle: Handle,
    pub id: String,
    /// Event type ("Birth", "Death", "Marriage", ...). Free-form.
    pub kind: String,
    pub description: String,
    pub place: Option<Handle>,
    pub change: i64,
}

impl Event {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            kind: kind.into(),
            description: String::new(),
            place: None,
            change: now_unix(),
        }
    }
}

// ─────────────────────────────────────────────
// Place
// ─────────────────────────────────────────────

/// The one hierarchical category: places nest via `parent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub handle: Handle,
    pub id: String,
    pub name: String,
    /// Enclosing place, if any. Drives the tree cursor order.
    pub parent: Option<Handle>,
    pub change: i64,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            name: name.into(),
            parent: None,
            change: now_unix(),
        }
    }
}

// ─────────────────────────────────────────────
// Source / Citation
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub handle: Handle,
    pub id: String,
    pub title: String,
    pub author: String,
    pub repo_refs: Vec<Handle>,
    pub change: i64,
}

impl Source {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            title: title.into(),
            author: String::new(),
            repo_refs: Vec::new(),
            change: now_unix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub handle: Handle,
    pub id: String,
    pub source: Option<Handle>,
    pub page: String,
    pub change: i64,
}

impl Citation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            source: None,
            page: String::new(),
            change: now_unix(),
        }
    }
}

// ─────────────────────────────────────────────
// Media / Repository / Note
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub handle: Handle,
    pub id: String,
    pub path: String,
    pub description: String,
    pub change: i64,
}

impl Media {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            path: path.into(),
            description: String::new(),
            change: now_unix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub handle: Handle,
    pub id: String,
    pub name: String,
    pub kind: String,
    pub change: i64,
}

impl Repository {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            name: name.into(),
            kind: String::new(),
            change: now_unix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub handle: Handle,
    pub id: String,
    pub text: String,
    pub kind: String,
    pub change: i64,
}

impl Note {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            handle: Handle::new(),
            id: id.into(),
            text: text.into(),
            kind: String::new(),
            change: now_unix(),
        }
    }
}

// ─────────────────────────────────────────────
// Record bindings
// ─────────────────────────────────────────────

macro_rules! impl_record {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Record for $ty {
            const KIND: RecordKind = $kind;

            fn handle(&self) -> Handle {
                self.handle
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn change(&self) -> i64 {
                self.change
            }

            fn table(store: &Store) -> &Table<Self> {
                &store.$field
            }
        }
    };
}

impl_record!(Person, RecordKind::Person, people);
impl_record!(Family, RecordKind::Family, families);
impl_record!(Event, RecordKind::Event, events);
impl_record!(Source, RecordKind::Source, sources);
impl_record!(Citation, RecordKind::Citation, citations);
impl_record!(Media, RecordKind::Media, media);
impl_record!(Repository, RecordKind::Repository, repositories);
impl_record!(Note, RecordKind::Note, notes);

// Place overrides `parent`: it is the hierarchical category.
impl Record for Place {
    const KIND: RecordKind = RecordKind::Place;

    fn handle(&self) -> Handle {
        self.handle
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn change(&self) -> i64 {
        self.change
    }

    fn parent(&self) -> Option<Handle> {
        self.parent
    }

    fn table(store: &Store) -> &Table<Self> {
        &store.places
    }
}
