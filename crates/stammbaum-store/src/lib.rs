//! # stammbaum-store
//!
//! Category-partitioned, graph-structured record store for Stammbaum.
//!
//! Provides the data model and the in-memory store the filter engine
//! evaluates against:
//! - [`Handle`] — opaque, store-assigned record identity (UUIDv4)
//! - [`model::Record`] — per-category behavior plus the table binding
//! - [`Table`]  — one category's records: enumerate, cursor, tree cursor,
//!   fetch, count
//! - [`Store`]  — the nine category tables behind one façade
//!
//! Records reference each other by handle (people → families → children,
//! places → enclosing places), which is what makes the store graph-shaped.
//! Persistent storage, serialization formats, and merge tooling live
//! elsewhere; this crate is the evaluation substrate.

pub mod error;
pub mod handle;
pub mod model;
pub mod store;
pub mod table;

pub use error::StoreError;
pub use handle::Handle;
pub use model::{
    Citation, Event, Family, Gender, Media, Name, Note, Person, Place, Record, RecordKind,
    Repository, Source,
};
pub use store::Store;
pub use table::Table;
