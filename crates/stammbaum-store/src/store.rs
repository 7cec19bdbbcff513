use crate::model::{
    Citation, Event, Family, Media, Note, Person, Place, Record, RecordKind, Repository, Source,
};
use crate::table::Table;

// ─────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────

/// The in-memory, category-partitioned record store.
///
/// Owns one [`Table`] per category. The filter engine only reads; the
/// mutation surface here is what fixtures and importers need. Reads are
/// re-entrant; mutating the store while a scan is in flight is the caller's
/// problem to prevent, not this store's.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub(crate) people: Table<Person>,
    pub(crate) families: Table<Family>,
    pub(crate) events: Table<Event>,
    pub(crate) places: Table<Place>,
    pub(crate) sources: Table<Source>,
    pub(crate) citations: Table<Citation>,
    pub(crate) media: Table<Media>,
    pub(crate) repositories: Table<Repository>,
    pub(crate) notes: Table<Note>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table holding records of type `R`.
    pub fn table<R: Record>(&self) -> &Table<R> {
        R::table(self)
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Person => self.people.len(),
            RecordKind::Family => self.families.len(),
            RecordKind::Event => self.events.len(),
            RecordKind::Place => self.places.len(),
            RecordKind::Source => self.sources.len(),
            RecordKind::Citation => self.citations.len(),
            RecordKind::Media => self.media.len(),
            RecordKind::Repository => self.repositories.len(),
            RecordKind::Note => self.notes.len(),
        }
    }

    // ── Category accessors ─────────────────────────────

    pub fn people(&self) -> &Table<Person> {
        &self.people
    }

    pub fn families(&self) -> &Table<Family> {
        &self.families
    }

    pub fn events(&self) -> &Table<Event> {
        &self.events
    }

    pub fn places(&self) -> &Table<Place> {
        &self.places
    }

    pub fn sources(&self) -> &Table<Source> {
        &self.sources
    }

    pub fn citations(&self) -> &Table<Citation> {
        &self.citations
    }

    pub fn media(&self) -> &Table<Media> {
        &self.media
    }

    pub fn repositories(&self) -> &Table<Repository> {
        &self.repositories
    }

    pub fn notes(&self) -> &Table<Note> {
        &self.notes
    }

    // ── Mutation ───────────────────────────────────────

    pub fn add_person(&mut self, person: Person) -> crate::Handle {
        self.people.insert(person)
    }

    pub fn add_family(&mut self, family: Family) -> crate::Handle {
        self.families.insert(family)
    }

    pub fn add_event(&mut self, event: Event) -> crate::Handle {
        self.events.insert(event)
    }

    pub fn add_place(&mut self, place: Place) -> crate::Handle {
        self.places.insert(place)
    }

    pub fn add_source(&mut self, source: Source) -> crate::Handle {
        self.sources.insert(source)
    }

    pub fn add_citation(&mut self, citation: Citation) -> crate::Handle {
        self.citations.insert(citation)
    }

    pub fn add_media(&mut self, media: Media) -> crate::Handle {
        self.media.insert(media)
    }

    pub fn add_repository(&mut self, repository: Repository) -> crate::Handle {
        self.repositories.insert(repository)
    }

    pub fn add_note(&mut self, note: Note) -> crate::Handle {
        self.notes.insert(note)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::model::{Gender, Name};

    use super::*;

    #[test]
    fn generic_table_access_matches_typed_access() {
        let mut store = Store::new();
        let h = store.add_person(Person::new(
            "I0001",
            Name::new("Johanna", "Weber"),
            Gender::Male,
        ));

        assert_eq!(store.table::<Person>().len(), 1);
        assert_eq!(store.people().get(h).unwrap().id, "I0001");
        assert_eq!(store.count(RecordKind::Person), 1);
        assert_eq!(store.count(RecordKind::Note), 0);
    }
}
